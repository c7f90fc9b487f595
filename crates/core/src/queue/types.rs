//! Types for the admission queue.

use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::types::{FlowFailure, LoginRedirect};

/// Where the caller stands in the admission queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePosition {
    /// Anchor assigned on the first poll.
    pub absolute: u64,
    /// Position relative to the anchor, as reported by the backend.
    pub relative: i64,
    pub purchasable: bool,
    /// Session opened by the backend together with admission, if any.
    pub purchase_session: Option<String>,
}

/// Result of a single queue poll.
#[derive(Debug, Clone)]
pub enum QueuePoll {
    /// Still queued.
    Waiting(QueuePosition),
    /// The caller may proceed to reservation.
    Admitted(QueuePosition),
    SoldOut,
    /// The session is not authenticated.
    Redirect(LoginRedirect),
    /// Transport or unexpected failure; the next tick tries again.
    Recoverable(ApiError),
    /// Another poll for the same resource was still in flight.
    Skipped,
}

/// How the queue phase ended.
#[derive(Debug, Clone)]
pub enum QueueOutcome {
    Admitted(QueuePosition),
    SoldOut,
    Redirect(LoginRedirect),
    Failed(FlowFailure),
    Cancelled,
}

impl QueuePoll {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            QueuePoll::Waiting(_) => "waiting",
            QueuePoll::Admitted(_) => "admitted",
            QueuePoll::SoldOut => "sold_out",
            QueuePoll::Redirect(_) => "redirect",
            QueuePoll::Recoverable(_) => "error",
            QueuePoll::Skipped => "skipped",
        }
    }
}
