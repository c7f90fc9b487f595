//! Payment attempts for a confirmed reservation.
//!
//! Each attempt walks `Idle -> Pending -> {Success, Failed, Timeout}`. A retry
//! is always a brand-new attempt with its own payment id.

mod orchestrator;
mod types;

pub use orchestrator::PaymentOrchestrator;
pub use types::{PaymentAttempt, PaymentOutcome, PaymentState, TimeoutReason};
