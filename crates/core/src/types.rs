//! Types shared by every phase of a purchase flow.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The contested resource: one ticket type of one festival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub festival_id: u64,
    pub ticket_id: u64,
}

impl ResourceId {
    pub fn new(festival_id: u64, ticket_id: u64) -> Self {
        Self {
            festival_id,
            ticket_id,
        }
    }

    /// Path of the purchase page for this resource, used as the login return path.
    pub fn purchase_path(&self) -> String {
        format!(
            "/festivals/{}/tickets/{}/purchase",
            self.festival_id, self.ticket_id
        )
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.festival_id, self.ticket_id)
    }
}

/// The caller must authenticate and come back to `return_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRedirect {
    pub login_path: String,
    pub return_path: String,
}

impl LoginRedirect {
    pub fn for_resource(resource: ResourceId) -> Self {
        Self {
            login_path: "/login".to_string(),
            return_path: resource.purchase_path(),
        }
    }
}

/// A terminal failure surfaced to the user.
///
/// Carries a single human-readable message. `retryable` tells the caller
/// whether offering an explicit "try again" action makes sense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FlowFailure {
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
}

/// Why a flow phase ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport failures exceeded the retry budget.
    RetryBudgetExhausted,
    /// The user already owns this ticket.
    AlreadyPurchased,
    /// The ticket is not on sale right now.
    OutsideSaleWindow,
    /// The backend refused to open a purchase session.
    NotPurchasable,
    /// The backend broke the protocol (e.g. reused a payment id).
    Protocol,
    /// The payment provider rejected the attempt.
    PaymentFailed,
    /// The payment attempt expired before completing.
    PaymentTimeout,
    /// The request starting the payment got no answer.
    PaymentNotStarted,
}

impl FlowFailure {
    pub fn retry_budget_exhausted(phase: &str, last_error: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::RetryBudgetExhausted,
            message: format!("Could not reach the ticket service during {}: {}", phase, last_error),
            retryable: true,
        }
    }

    pub fn already_purchased() -> Self {
        Self {
            kind: FailureKind::AlreadyPurchased,
            message: "You have already purchased this ticket.".to_string(),
            retryable: false,
        }
    }

    pub fn outside_sale_window() -> Self {
        Self {
            kind: FailureKind::OutsideSaleWindow,
            message: "This ticket cannot be purchased at this time.".to_string(),
            retryable: false,
        }
    }

    pub fn not_purchasable() -> Self {
        Self {
            kind: FailureKind::NotPurchasable,
            message: "This ticket is currently not available for purchase.".to_string(),
            retryable: false,
        }
    }

    pub fn payment_failed() -> Self {
        Self {
            kind: FailureKind::PaymentFailed,
            message: "The payment failed.".to_string(),
            retryable: true,
        }
    }

    pub fn payment_timeout() -> Self {
        Self {
            kind: FailureKind::PaymentTimeout,
            message: "The payment timed out.".to_string(),
            retryable: true,
        }
    }

    /// The start request may or may not have reached the backend, so only
    /// the buyer decides whether a new attempt is made.
    pub fn payment_not_started(error: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::PaymentNotStarted,
            message: format!("The payment could not be started: {}", error),
            retryable: true,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Protocol,
            message: message.into(),
            retryable: true,
        }
    }
}
