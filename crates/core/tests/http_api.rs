//! HTTP client integration tests.
//!
//! These tests run `HttpTicketingApi` against an in-process axum backend
//! that speaks the ticketing REST contract.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use ticketgate_core::{
    api::{ApiError, DomainError, PaymentStatus},
    config::{ApiConfig, ErrorCodes},
    testing::{fixtures, ScriptedConfirmer},
    CancelToken, FlowOutcome, HttpTicketingApi, NoopObserver, PositionAnchorStore, ResourceId,
    TicketFlow, TicketingApi,
};

/// What the stub backend saw.
#[derive(Default)]
struct Seen {
    wait_queries: Vec<Option<String>>,
    cookies: Vec<Option<String>>,
    sessions: Vec<String>,
    start_bodies: Vec<Value>,
}

type Shared = Arc<Mutex<Seen>>;

fn ok(data: Value) -> Response {
    Json(json!({ "status": "SUCCESS", "data": data })).into_response()
}

fn fail(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "errorCode": code, "message": message }))).into_response()
}

async fn wait(
    State(seen): State<Shared>,
    Path((festival, _ticket)): Path<(u64, u64)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut seen = seen.lock().await;
    seen.wait_queries.push(query.get("waitOrder").cloned());
    seen.cookies.push(
        headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );

    if festival == 9 {
        return fail(StatusCode::BAD_REQUEST, "WT-0002", "sold out");
    }
    match query.get("waitOrder") {
        Some(anchor) => ok(json!({
            "purchasable": true,
            "relativeWaitOrder": 0,
            "absoluteWaitOrder": anchor.parse::<u64>().unwrap_or(0),
            "purchaseSession": "session-http",
        })),
        None => ok(json!({
            "purchasable": false,
            "relativeWaitOrder": 42,
            "absoluteWaitOrder": 1000,
        })),
    }
}

async fn check(Path((festival, _ticket)): Path<(u64, u64)>) -> Response {
    match festival {
        2 => fail(StatusCode::BAD_REQUEST, "TK-0002", "already purchased"),
        3 => (
            StatusCode::CONFLICT,
            Json(json!({
                "errorCode": "TK-0006",
                "message": "already reserved",
                "data": { "purchaseSession": "held" },
            })),
        )
            .into_response(),
        4 => StatusCode::UNAUTHORIZED.into_response(),
        5 => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
        _ => ok(json!({ "purchasable": true, "purchaseSession": "fresh" })),
    }
}

async fn preview(
    State(seen): State<Shared>,
    Path((_festival, _ticket, session)): Path<(u64, u64, String)>,
) -> Response {
    seen.lock().await.sessions.push(session);
    ok(json!({
        "festivalTitle": "Summer Sound Festival",
        "ticketName": "General Admission",
        "ticketPrice": 55000,
        "remainTicketQuantity": 120,
    }))
}

async fn start(
    State(seen): State<Shared>,
    Path((_festival, _ticket)): Path<(u64, u64)>,
    Json(body): Json<Value>,
) -> Response {
    let mut seen = seen.lock().await;
    seen.start_bodies.push(body);
    ok(json!({ "paymentId": format!("pay-{}", seen.start_bodies.len()) }))
}

async fn status(Path((_festival, _ticket, payment_id)): Path<(u64, u64, String)>) -> Response {
    match payment_id.as_str() {
        "gone" => fail(StatusCode::NOT_FOUND, "P-0001", "payment not found"),
        "weird" => ok(json!({ "paymentStatus": "REFUNDED" })),
        _ => ok(json!({ "paymentStatus": "SUCCESS" })),
    }
}

/// Start the stub backend; returns its `/api/v1` base URL.
async fn spawn_backend() -> (String, Shared) {
    let seen = Shared::default();
    let app = Router::new()
        .route("/api/v1/festivals/{f}/tickets/{t}/purchase", axum::routing::post(start))
        .route("/api/v1/festivals/{f}/tickets/{t}/purchase/wait", get(wait))
        .route("/api/v1/festivals/{f}/tickets/{t}/purchase/check", get(check))
        .route("/api/v1/festivals/{f}/tickets/{t}/purchase/{id}", get(preview))
        .route(
            "/api/v1/festivals/{f}/tickets/{t}/purchase/{id}/status",
            get(status),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/v1", addr), seen)
}

fn client(base_url: &str) -> HttpTicketingApi {
    HttpTicketingApi::new(&ApiConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        session_cookie: Some("JSESSIONID=abc123".to_string()),
    })
    .unwrap()
}

#[tokio::test]
async fn test_wait_order_sends_anchor_only_when_cached() {
    let (base_url, seen) = spawn_backend().await;
    let api = client(&base_url);
    let resource = ResourceId::new(1, 1);

    let first = api.wait_order(resource, None).await.unwrap();
    assert!(!first.purchasable);
    assert_eq!(first.relative_wait_order, Some(42));
    assert_eq!(first.absolute_wait_order, Some(1000));

    let second = api.wait_order(resource, Some(1000)).await.unwrap();
    assert!(second.purchasable);
    assert_eq!(second.purchase_session.as_deref(), Some("session-http"));

    let seen = seen.lock().await;
    assert_eq!(seen.wait_queries, vec![None, Some("1000".to_string())]);
    assert!(seen
        .cookies
        .iter()
        .all(|c| c.as_deref() == Some("JSESSIONID=abc123")));
}

#[tokio::test]
async fn test_domain_error_bodies_are_decoded() {
    let (base_url, _seen) = spawn_backend().await;
    let api = client(&base_url);
    let codes = ErrorCodes::default();

    let err = api.check_purchasable(ResourceId::new(2, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Domain { status: 400, ref code, .. } if code == "TK-0002"
    ));
    assert_eq!(err.classify(&codes), Some(DomainError::AlreadyPurchased));

    let err = api.check_purchasable(ResourceId::new(3, 1)).await.unwrap_err();
    assert_eq!(
        err.classify(&codes),
        Some(DomainError::AlreadyReserved {
            session: Some("held".to_string())
        })
    );

    let err = api.wait_order(ResourceId::new(9, 1), None).await.unwrap_err();
    assert_eq!(err.classify(&codes), Some(DomainError::SoldOut));
}

#[tokio::test]
async fn test_bare_status_errors() {
    let (base_url, _seen) = spawn_backend().await;
    let api = client(&base_url);
    let codes = ErrorCodes::default();

    let err = api.check_purchasable(ResourceId::new(4, 1)).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.classify(&codes), Some(DomainError::Unauthenticated));

    let err = api.check_purchasable(ResourceId::new(5, 1)).await.unwrap_err();
    match err {
        ApiError::Http { status, ref message } => {
            assert_eq!(status, 502);
            assert_eq!(message, "upstream down");
        }
        ref other => panic!("expected HTTP error, got {:?}", other),
    }
    assert_eq!(err.classify(&codes), None);
}

#[tokio::test]
async fn test_payment_endpoints() {
    let (base_url, seen) = spawn_backend().await;
    let api = client(&base_url);
    let resource = ResourceId::new(1, 1);

    let started = api.start_payment(resource).await.unwrap();
    assert_eq!(started.payment_id, "pay-1");
    assert_eq!(seen.lock().await.start_bodies, vec![json!({})]);

    let status = api.payment_status(resource, "pay-1").await.unwrap();
    assert_eq!(status.payment_status, PaymentStatus::Success);

    let unknown = api.payment_status(resource, "weird").await.unwrap();
    assert_eq!(unknown.payment_status, PaymentStatus::Unknown);

    let gone = api.payment_status(resource, "gone").await.unwrap_err();
    assert_eq!(
        gone.classify(&ErrorCodes::default()),
        Some(DomainError::NotFound)
    );
}

#[tokio::test]
async fn test_session_is_path_encoded() {
    let (base_url, seen) = spawn_backend().await;
    let api = client(&base_url);

    api.purchase_preview(ResourceId::new(1, 1), "a b/c")
        .await
        .unwrap();
    assert_eq!(seen.lock().await.sessions, vec!["a b/c".to_string()]);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let api = client("http://127.0.0.1:1/api/v1");
    let err = api.wait_order(ResourceId::new(1, 1), None).await.unwrap_err();
    assert!(matches!(err, ApiError::ConnectionFailed(_)));
    assert_eq!(err.classify(&ErrorCodes::default()), None);
}

#[tokio::test]
async fn test_full_flow_over_http() {
    let (base_url, seen) = spawn_backend().await;
    let mut config = fixtures::config();
    config.api.base_url = base_url;
    config.queue.poll_interval_ms = 20;
    config.payment.poll_interval_ms = 20;
    config.payment.timeout_ms = 1000;
    config.payment.success_redirect_delay_ms = 10;

    let api = Arc::new(HttpTicketingApi::new(&config.api).unwrap());
    let flow = TicketFlow::new(api, PositionAnchorStore::new(), &config);

    let outcome = flow
        .run(
            ResourceId::new(1, 1),
            &ScriptedConfirmer::approve(),
            Arc::new(NoopObserver),
            &CancelToken::new(),
        )
        .await;

    match outcome {
        FlowOutcome::Purchased(attempt) => assert_eq!(attempt.payment_id, "pay-1"),
        other => panic!("expected purchase, got {:?}", other),
    }
    let seen = seen.lock().await;
    assert_eq!(seen.wait_queries, vec![None, Some("1000".to_string())]);
    assert_eq!(seen.sessions, vec!["session-http".to_string()]);
}
