//! Types for payment attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{FlowFailure, LoginRedirect};

/// Lifecycle state of the current payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Idle,
    Pending,
    Success,
    Failed,
    Timeout,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Success | PaymentState::Failed | PaymentState::Timeout
        )
    }
}

/// Why an attempt timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutReason {
    /// The backend no longer knows the attempt.
    Expired,
    /// The attempt stayed pending up to the configured ceiling.
    Ceiling,
}

/// One payment attempt as observed by this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub payment_id: String,
    pub state: PaymentState,
    /// Time accounted to the attempt, advanced once per status poll.
    pub elapsed: Duration,
    pub polls: u32,
    pub started_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn new(payment_id: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            state: PaymentState::Pending,
            elapsed: Duration::ZERO,
            polls: 0,
            started_at: Utc::now(),
        }
    }
}

/// How one attempt ended.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Success(PaymentAttempt),
    /// The provider rejected the payment, or the attempt could not be
    /// observed. `attempt` is `None` when starting the payment failed.
    Failed {
        attempt: Option<PaymentAttempt>,
        failure: Option<FlowFailure>,
    },
    Timeout {
        attempt: PaymentAttempt,
        reason: TimeoutReason,
    },
    /// The backend no longer accepts the session cookie.
    Redirect(LoginRedirect),
    /// Observation stopped; the attempt continues on the backend.
    Cancelled,
}

impl PaymentOutcome {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentOutcome::Success(_) => "success",
            PaymentOutcome::Failed { failure: None, .. } => "failed",
            PaymentOutcome::Failed { failure: Some(_), .. } => "error",
            PaymentOutcome::Timeout { .. } => "timeout",
            PaymentOutcome::Redirect(_) => "redirect",
            PaymentOutcome::Cancelled => "cancelled",
        }
    }

    pub fn attempt(&self) -> Option<&PaymentAttempt> {
        match self {
            PaymentOutcome::Success(attempt) | PaymentOutcome::Timeout { attempt, .. } => {
                Some(attempt)
            }
            PaymentOutcome::Failed { attempt, .. } => attempt.as_ref(),
            PaymentOutcome::Redirect(_) | PaymentOutcome::Cancelled => None,
        }
    }

    /// The user-facing failure for an outcome that is not a success.
    pub fn failure(&self) -> Option<FlowFailure> {
        match self {
            PaymentOutcome::Success(_)
            | PaymentOutcome::Redirect(_)
            | PaymentOutcome::Cancelled => None,
            PaymentOutcome::Failed {
                failure: Some(failure),
                ..
            } => Some(failure.clone()),
            PaymentOutcome::Failed { failure: None, .. } => Some(FlowFailure::payment_failed()),
            PaymentOutcome::Timeout { .. } => Some(FlowFailure::payment_timeout()),
        }
    }
}
