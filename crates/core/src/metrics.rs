//! Prometheus metrics for the purchase flow.
//!
//! This module provides metrics for:
//! - Admission queue polling
//! - Reservation outcomes
//! - Payment attempts
//! - Retries of recoverable failures

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Queue Metrics
// =============================================================================

/// Queue polls total by result.
pub static QUEUE_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketgate_queue_polls_total", "Total admission queue polls"),
        &["result"], // "waiting", "admitted", "sold_out", "redirect", "error"
    )
    .unwrap()
});

/// Polls skipped because another poll for the same resource was in flight.
pub static QUEUE_POLLS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketgate_queue_polls_skipped_total",
        "Queue polls skipped while a previous poll was still in flight",
    )
    .unwrap()
});

// =============================================================================
// Reservation Metrics
// =============================================================================

/// Reservations total by result.
pub static RESERVATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketgate_reservations_total", "Total reservation attempts"),
        &["result"], // "created", "reused", "adopted", "redirect", "terminal", "error", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Payment Metrics
// =============================================================================

/// Payment attempts total by outcome.
pub static PAYMENT_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketgate_payment_attempts_total", "Total payment attempts"),
        &["outcome"], // "success", "failed", "timeout", "error", "cancelled"
    )
    .unwrap()
});

/// Time from payment start to a terminal status, in seconds.
pub static PAYMENT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketgate_payment_duration_seconds",
            "Elapsed time of payment attempts",
        )
        .buckets(vec![1.0, 3.0, 6.0, 9.0, 15.0, 21.0, 30.0, 45.0, 60.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Retry Metrics
// =============================================================================

/// Retries of recoverable failures by phase.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketgate_retry_attempts_total", "Total retry attempts"),
        &["phase"], // "reservation", "snapshot"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(QUEUE_POLLS.clone()),
        Box::new(QUEUE_POLLS_SKIPPED.clone()),
        Box::new(RESERVATIONS.clone()),
        Box::new(PAYMENT_ATTEMPTS.clone()),
        Box::new(PAYMENT_DURATION.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
    ]
}
