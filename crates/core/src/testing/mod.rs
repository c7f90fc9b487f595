//! Testing utilities and mock implementations.
//!
//! This module provides a scripted [`MockTicketingApi`] plus a confirmer and
//! an observer that record what a flow asked and reported, so whole purchase
//! flows can be driven on a paused tokio clock without a backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketgate_core::testing::{fixtures, MockTicketingApi, RecordingObserver, ScriptedConfirmer};
//!
//! let api = Arc::new(MockTicketingApi::new());
//! api.push_wait(Ok(fixtures::admitted(Some("abc")))).await;
//! api.push_status(Ok(fixtures::status(PaymentStatus::Success))).await;
//!
//! let flow = TicketFlow::new(api.clone(), PositionAnchorStore::new(), &fixtures::config());
//! let outcome = flow
//!     .run(fixtures::resource(), &ScriptedConfirmer::approve(), Arc::new(RecordingObserver::new()), &CancelToken::new())
//!     .await;
//! ```

mod mock_ticketing_api;
mod recorders;

pub use mock_ticketing_api::{Endpoint, MockTicketingApi, RecordedCall};
pub use recorders::{FlowEvent, RecordingObserver, ScriptedConfirmer};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::api::{
        ApiError, PaymentStatus, PaymentStatusResponse, PurchasableResponse,
        PurchasePreviewResponse, WaitOrderResponse,
    };
    use crate::config::{ApiConfig, Config, ErrorCodes, PaymentConfig, QueueConfig, RetryConfig};
    use crate::queue::QueuePosition;
    use crate::reservation::{ConfirmedReservation, PurchaseSession, PurchaseSnapshot, Reservation};
    use crate::types::ResourceId;

    /// Configuration with every default and a local base URL.
    pub fn config() -> Config {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:8080/api/v1".to_string(),
                timeout_secs: 10,
                session_cookie: None,
            },
            queue: QueueConfig::default(),
            payment: PaymentConfig::default(),
            retry: RetryConfig::default(),
            error_codes: ErrorCodes::default(),
        }
    }

    /// The resource most tests contend for.
    pub fn resource() -> ResourceId {
        ResourceId::new(1, 1)
    }

    /// A queue poll that is still waiting.
    pub fn waiting(relative: i64, absolute: Option<u64>) -> WaitOrderResponse {
        WaitOrderResponse {
            purchasable: false,
            relative_wait_order: Some(relative),
            absolute_wait_order: absolute,
            purchase_session: None,
        }
    }

    /// A queue poll that admits the caller.
    pub fn admitted(session: Option<&str>) -> WaitOrderResponse {
        WaitOrderResponse {
            purchasable: true,
            relative_wait_order: Some(0),
            absolute_wait_order: None,
            purchase_session: session.map(str::to_string),
        }
    }

    /// The admission handed from the queue to the reservation phase.
    pub fn admission(session: Option<&str>) -> QueuePosition {
        QueuePosition {
            absolute: 1000,
            relative: 0,
            purchasable: true,
            purchase_session: session.map(str::to_string),
        }
    }

    pub fn purchasable(session: &str) -> PurchasableResponse {
        PurchasableResponse {
            purchasable: true,
            purchase_session: Some(session.to_string()),
        }
    }

    pub fn preview() -> PurchasePreviewResponse {
        PurchasePreviewResponse {
            festival_title: "Summer Sound Festival".to_string(),
            ticket_name: "General Admission".to_string(),
            ticket_price: 55_000,
            remain_ticket_quantity: 120,
        }
    }

    pub fn status(status: PaymentStatus) -> PaymentStatusResponse {
        PaymentStatusResponse {
            payment_status: status,
        }
    }

    /// A backend error carrying a domain code.
    pub fn domain_error(status: u16, code: &str) -> ApiError {
        ApiError::Domain {
            status,
            code: code.to_string(),
            message: format!("domain error {}", code),
            data: None,
        }
    }

    /// The "already reserved" error, optionally naming the held session.
    pub fn already_reserved(session: Option<&str>) -> ApiError {
        ApiError::Domain {
            status: 409,
            code: "TK-0006".to_string(),
            message: "purchase session already exists".to_string(),
            data: session.map(|s| serde_json::json!({ "purchaseSession": s })),
        }
    }

    /// A reservation for [`resource`] with session `session-1`.
    pub fn reservation() -> Reservation {
        Reservation {
            session: PurchaseSession {
                token: "session-1".to_string(),
                resource: resource(),
            },
            snapshot: PurchaseSnapshot::from(preview()),
        }
    }

    pub fn confirmed() -> ConfirmedReservation {
        reservation().confirm()
    }
}
