//! Purchase flow lifecycle integration tests.
//!
//! These tests drive complete flows against the scripted API on a paused
//! clock: queue -> reservation -> confirmation -> payment.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ticketgate_core::{
    api::{ApiError, PaymentIdResponse, PaymentStatus},
    testing::{fixtures, Endpoint, FlowEvent, MockTicketingApi, RecordingObserver, ScriptedConfirmer},
    CancelToken, Config, FailureKind, FlowOutcome, PaymentOutcome, PositionAnchorStore,
    TicketFlow, TimeoutReason,
};

/// Test helper holding everything one or more flows share.
struct TestHarness {
    api: Arc<MockTicketingApi>,
    anchors: PositionAnchorStore,
    observer: Arc<RecordingObserver>,
    config: Config,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            api: Arc::new(MockTicketingApi::new()),
            anchors: PositionAnchorStore::new(),
            observer: Arc::new(RecordingObserver::new()),
            config: fixtures::config(),
        }
    }

    fn flow(&self) -> TicketFlow {
        TicketFlow::new(self.api.clone(), self.anchors.clone(), &self.config)
    }

    async fn run(&self, confirmer: &ScriptedConfirmer) -> FlowOutcome {
        self.flow()
            .run(
                fixtures::resource(),
                confirmer,
                self.observer.clone(),
                &CancelToken::new(),
            )
            .await
    }

    /// Run a flow in the background; cancel it through the returned token.
    fn spawn(&self, confirmer: ScriptedConfirmer) -> (JoinHandle<FlowOutcome>, CancelToken) {
        let flow = self.flow();
        let observer = self.observer.clone();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            flow.run(fixtures::resource(), &confirmer, observer, &token)
                .await
        });
        (handle, cancel)
    }
}

// =============================================================================
// Queue
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_queue_position_updates_against_fixed_anchor() {
    let mut harness = TestHarness::new();
    harness.config.queue.poll_interval_ms = 2000;
    harness
        .api
        .push_wait(Ok(fixtures::waiting(42, Some(1000))))
        .await;
    harness.api.push_wait(Ok(fixtures::waiting(30, None))).await;

    let (handle, cancel) = harness.spawn(ScriptedConfirmer::approve());
    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();

    assert!(matches!(handle.await.unwrap(), FlowOutcome::Cancelled));
    assert_eq!(harness.observer.relative_positions().await, vec![42, 30]);
    assert_eq!(harness.api.wait_anchors().await, vec![None, Some(1000)]);
    assert_eq!(harness.anchors.get(fixtures::resource()).await, Some(1000));
}

#[tokio::test(start_paused = true)]
async fn test_anchor_is_stable_across_polls_and_reentry() {
    let harness = TestHarness::new();
    harness
        .api
        .push_wait(Ok(fixtures::waiting(50, Some(1000))))
        .await;
    harness
        .api
        .push_wait(Ok(fixtures::waiting(45, Some(1500))))
        .await;
    harness
        .api
        .push_wait(Ok(fixtures::waiting(40, Some(900))))
        .await;

    let (handle, cancel) = harness.spawn(ScriptedConfirmer::approve());
    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();
    handle.await.unwrap();

    let anchors = harness.api.wait_anchors().await;
    assert_eq!(anchors[0], None);
    assert!(anchors.len() >= 4);
    assert!(anchors[1..].iter().all(|a| *a == Some(1000)));

    // Leaving the flow keeps the anchor; coming back resumes from it.
    harness.api.clear_recorded().await;
    let (handle, cancel) = harness.spawn(ScriptedConfirmer::approve());
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(harness.api.wait_anchors().await, vec![Some(1000)]);
}

#[tokio::test(start_paused = true)]
async fn test_no_concurrent_queue_polls() {
    let harness = TestHarness::new();
    harness.api.set_delay(Duration::from_secs(5)).await;

    let (handle, cancel) = harness.spawn(ScriptedConfirmer::approve());
    tokio::time::sleep(Duration::from_secs(20)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(harness.api.max_concurrent_waits(), 1);
    let polls = harness.api.calls_to(Endpoint::Wait).await;
    assert!(polls.len() <= 5, "got {} polls", polls.len());
    for pair in polls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(5));
    }
}

#[tokio::test(start_paused = true)]
async fn test_sold_out_ends_flow_and_clears_anchor() {
    let harness = TestHarness::new();
    harness
        .api
        .push_wait(Ok(fixtures::waiting(10, Some(300))))
        .await;
    harness
        .api
        .push_wait(Err(fixtures::domain_error(400, "WT-0002")))
        .await;

    let outcome = harness.run(&ScriptedConfirmer::approve()).await;

    assert!(matches!(outcome, FlowOutcome::SoldOut));
    assert_eq!(harness.anchors.get(fixtures::resource()).await, None);
    assert!(harness.api.calls_to(Endpoint::Check).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_queue_redirects_to_login() {
    let harness = TestHarness::new();
    harness
        .api
        .push_wait(Err(ApiError::Http {
            status: 401,
            message: String::new(),
        }))
        .await;

    match harness.run(&ScriptedConfirmer::approve()).await {
        FlowOutcome::Redirect(redirect) => {
            assert_eq!(redirect.return_path, "/festivals/1/tickets/1/purchase")
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_queue_errors_are_retried_silently() {
    let harness = TestHarness::new();
    harness
        .api
        .push_wait(Err(ApiError::ConnectionFailed("reset".into())))
        .await;
    harness
        .api
        .push_wait(Err(ApiError::Http {
            status: 503,
            message: "unavailable".into(),
        }))
        .await;
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;

    let outcome = harness.run(&ScriptedConfirmer::decline()).await;

    assert!(matches!(outcome, FlowOutcome::Declined));
    let errors = harness
        .observer
        .events()
        .await
        .into_iter()
        .filter(|e| matches!(e, FlowEvent::RecoverableError { .. }))
        .count();
    assert_eq!(errors, 2);
}

// =============================================================================
// Reservation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_admission_session_goes_straight_to_snapshot() {
    let harness = TestHarness::new();
    harness.anchors.set(fixtures::resource(), 1000).await;
    harness
        .api
        .push_wait(Ok(fixtures::admitted(Some("abc"))))
        .await;
    let confirmer = ScriptedConfirmer::decline();

    let outcome = harness.run(&confirmer).await;

    assert!(matches!(outcome, FlowOutcome::Declined));
    assert_eq!(harness.api.calls_to(Endpoint::Wait).await.len(), 1);
    assert!(harness.api.calls_to(Endpoint::Check).await.is_empty());
    let previews = harness.api.calls_to(Endpoint::Preview).await;
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].argument.as_deref(), Some("abc"));
    assert_eq!(harness.anchors.get(fixtures::resource()).await, None);
    assert_eq!(confirmer.confirmed_snapshots().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_reserved_reuses_existing_session() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(None))).await;
    harness
        .api
        .push_check(Err(fixtures::already_reserved(Some("existing"))))
        .await;

    let outcome = harness.run(&ScriptedConfirmer::decline()).await;

    assert!(matches!(outcome, FlowOutcome::Declined));
    assert_eq!(harness.api.calls_to(Endpoint::Check).await.len(), 1);
    let previews = harness.api.calls_to(Endpoint::Preview).await;
    assert_eq!(previews[0].argument.as_deref(), Some("existing"));
    assert!(!harness
        .observer
        .events()
        .await
        .iter()
        .any(|e| matches!(e, FlowEvent::RecoverableError { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_already_purchased_is_terminal() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(None))).await;
    harness
        .api
        .push_check(Err(fixtures::domain_error(400, "TK-0002")))
        .await;

    match harness.run(&ScriptedConfirmer::approve()).await {
        FlowOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::AlreadyPurchased);
            assert!(!failure.retryable);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(harness.api.calls_to(Endpoint::Check).await.len(), 1);
    assert!(harness
        .api
        .calls_to(Endpoint::StartPayment)
        .await
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_declined_purchase_never_starts_payment() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(None))).await;

    let outcome = harness.run(&ScriptedConfirmer::decline()).await;

    assert!(matches!(outcome, FlowOutcome::Declined));
    assert!(harness
        .api
        .calls_to(Endpoint::StartPayment)
        .await
        .is_empty());
}

// =============================================================================
// Payment
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_pending_payment_times_out_at_ceiling() {
    let mut harness = TestHarness::new();
    harness.config.payment.poll_interval_ms = 7500;
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness
        .api
        .push_start(Ok(PaymentIdResponse {
            payment_id: "p1".to_string(),
        }))
        .await;

    let outcome = harness.run(&ScriptedConfirmer::approve()).await;

    match outcome {
        FlowOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::PaymentTimeout),
        other => panic!("expected timeout failure, got {:?}", other),
    }

    let start = harness.api.calls_to(Endpoint::StartPayment).await;
    let polls = harness.api.calls_to(Endpoint::PaymentStatus).await;
    assert_eq!(polls.len(), 4);
    assert!(polls.iter().all(|c| c.argument.as_deref() == Some("p1")));
    assert_eq!(polls[3].at - start[0].at, Duration::from_secs(30));

    let timed_out = harness.observer.events().await.into_iter().find_map(|e| match e {
        FlowEvent::PaymentOutcome(PaymentOutcome::Timeout { attempt, reason }) => {
            Some((attempt, reason))
        }
        _ => None,
    });
    let (attempt, reason) = timed_out.expect("timeout outcome reported");
    assert_eq!(reason, TimeoutReason::Ceiling);
    assert_eq!(attempt.elapsed, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_ceiling_with_default_interval() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;

    let outcome = harness.run(&ScriptedConfirmer::approve()).await;
    assert!(matches!(outcome, FlowOutcome::Failed(ref f) if f.kind == FailureKind::PaymentTimeout));

    let start = harness.api.calls_to(Endpoint::StartPayment).await;
    let polls = harness.api.calls_to(Endpoint::PaymentStatus).await;
    assert_eq!(polls.len(), 10);
    assert_eq!(polls[8].at - start[0].at, Duration::from_secs(27));
    assert_eq!(polls[9].at - start[0].at, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_success_stops_polling_and_exits_once() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness
        .api
        .push_status(Ok(fixtures::status(PaymentStatus::Success)))
        .await;

    let outcome = harness.run(&ScriptedConfirmer::approve()).await;
    assert!(outcome.is_purchased());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.api.calls_to(Endpoint::PaymentStatus).await.len(), 1);
    assert_eq!(harness.observer.exit_count().await, 1);

    let events = harness.observer.timed_events().await;
    let succeeded_at = events
        .iter()
        .find(|(_, e)| matches!(e, FlowEvent::PaymentOutcome(PaymentOutcome::Success(_))))
        .map(|(at, _)| *at)
        .expect("success reported");
    let exited_at = events
        .iter()
        .find(|(_, e)| matches!(e, FlowEvent::ExitFlow))
        .map(|(at, _)| *at)
        .expect("exit fired");
    assert_eq!(exited_at - succeeded_at, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_success_suppresses_exit() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness
        .api
        .push_status(Ok(fixtures::status(PaymentStatus::Success)))
        .await;

    let (handle, cancel) = harness.spawn(ScriptedConfirmer::approve());
    // Success is observed at t=3; the exit would fire at t=6.
    tokio::time::sleep(Duration::from_secs(4)).await;
    cancel.cancel();

    assert!(handle.await.unwrap().is_purchased());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(harness.observer.exit_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_use_fresh_payment_ids() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness
        .api
        .push_status(Ok(fixtures::status(PaymentStatus::Failed)))
        .await;
    harness
        .api
        .push_status(Err(ApiError::Http {
            status: 404,
            message: String::new(),
        }))
        .await;
    harness
        .api
        .push_status(Ok(fixtures::status(PaymentStatus::Success)))
        .await;
    let confirmer = ScriptedConfirmer::new(true, vec![true, true]);
    let flow = harness.flow();

    let outcome = flow
        .run(
            fixtures::resource(),
            &confirmer,
            harness.observer.clone(),
            &CancelToken::new(),
        )
        .await;

    assert!(outcome.is_purchased());
    assert_eq!(confirmer.retry_prompts().await, vec!["failed", "timeout"]);

    let ids: Vec<_> = harness
        .api
        .calls_to(Endpoint::PaymentStatus)
        .await
        .into_iter()
        .filter_map(|c| c.argument)
        .collect();
    assert_eq!(ids, vec!["payment-1", "payment-2", "payment-3"]);
    assert_eq!(flow.payments().attempts().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_declined_retry_surfaces_failure() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness
        .api
        .push_status(Ok(fixtures::status(PaymentStatus::Failed)))
        .await;

    match harness.run(&ScriptedConfirmer::approve()).await {
        FlowOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::PaymentFailed);
            assert!(failure.retryable);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(harness.api.calls_to(Endpoint::StartPayment).await.len(), 1);
}

// =============================================================================
// Lost login and lost answers during payment
// =============================================================================

fn unauthorized() -> ApiError {
    ApiError::Http {
        status: 401,
        message: String::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_payment_start_redirects_without_retry_prompt() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness.api.push_start(Err(unauthorized())).await;
    let confirmer = ScriptedConfirmer::new(true, vec![true]);

    match harness.run(&confirmer).await {
        FlowOutcome::Redirect(redirect) => {
            assert_eq!(redirect.return_path, fixtures::resource().purchase_path())
        }
        other => panic!("expected redirect, got {:?}", other),
    }
    assert!(confirmer.retry_prompts().await.is_empty());
    assert_eq!(harness.api.calls_to(Endpoint::StartPayment).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_status_poll_redirects() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness.api.push_status(Err(unauthorized())).await;

    let outcome = harness.run(&ScriptedConfirmer::approve()).await;
    assert!(matches!(outcome, FlowOutcome::Redirect(_)));
    assert_eq!(harness.api.calls_to(Endpoint::PaymentStatus).await.len(), 1);
    assert_eq!(harness.observer.exit_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_snapshot_redirects_before_confirmation() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness.api.push_preview(Err(unauthorized())).await;
    let confirmer = ScriptedConfirmer::approve();

    let outcome = harness.run(&confirmer).await;
    assert!(matches!(outcome, FlowOutcome::Redirect(_)));
    assert!(confirmer.confirmed_snapshots().await.is_empty());
    assert_eq!(harness.api.calls_to(Endpoint::Preview).await.len(), 1);
    assert!(harness.api.calls_to(Endpoint::StartPayment).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lost_start_answer_waits_for_buyer_before_new_attempt() {
    let harness = TestHarness::new();
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness.api.push_start(Err(ApiError::Timeout)).await;
    harness
        .api
        .push_status(Ok(fixtures::status(PaymentStatus::Success)))
        .await;

    // Declining the retry leaves exactly one start request.
    match harness.run(&ScriptedConfirmer::approve()).await {
        FlowOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::PaymentNotStarted);
            assert!(failure.retryable);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(harness.api.calls_to(Endpoint::StartPayment).await.len(), 1);

    // Accepting the retry is the only way a second start is sent.
    harness.api.clear_recorded().await;
    harness.api.push_wait(Ok(fixtures::admitted(Some("s")))).await;
    harness.api.push_start(Err(ApiError::Timeout)).await;
    let confirmer = ScriptedConfirmer::new(true, vec![true]);

    assert!(harness.run(&confirmer).await.is_purchased());
    assert_eq!(confirmer.retry_prompts().await, vec!["error"]);
    assert_eq!(harness.api.calls_to(Endpoint::StartPayment).await.len(), 2);
}
