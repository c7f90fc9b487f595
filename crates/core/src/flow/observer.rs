//! Hooks through which a caller watches and steers a purchase flow.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::payment::{PaymentAttempt, PaymentOutcome};
use crate::queue::QueuePosition;
use crate::reservation::{PurchaseSnapshot, Reservation};
use crate::types::ResourceId;

/// Receives progress notifications from a running flow.
///
/// Every method defaults to doing nothing.
#[async_trait]
pub trait FlowObserver: Send + Sync {
    /// A queue poll reported a position.
    async fn on_queue_position(&self, _resource: ResourceId, _position: &QueuePosition) {}

    /// A poll failed but will be retried on the next tick.
    async fn on_recoverable_error(&self, _resource: ResourceId, _phase: &str, _error: &ApiError) {}

    /// A reservation with its snapshot awaits confirmation.
    async fn on_reservation_ready(&self, _resource: ResourceId, _reservation: &Reservation) {}

    async fn on_payment_started(&self, _resource: ResourceId, _attempt: &PaymentAttempt) {}

    /// The attempt is still pending after another status poll.
    async fn on_payment_progress(&self, _resource: ResourceId, _attempt: &PaymentAttempt) {}

    async fn on_payment_outcome(&self, _resource: ResourceId, _outcome: &PaymentOutcome) {}

    /// Fired once, a fixed delay after a successful payment.
    async fn on_exit_flow(&self, _resource: ResourceId) {}
}

/// Makes the decisions a flow must never take on its own.
#[async_trait]
pub trait PurchaseConfirmer: Send + Sync {
    /// Approve paying for `snapshot`.
    async fn confirm_purchase(&self, resource: ResourceId, snapshot: &PurchaseSnapshot) -> bool;

    /// Start a new attempt after `outcome` (failed or timed out).
    async fn retry_payment(&self, resource: ResourceId, outcome: &PaymentOutcome) -> bool;
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FlowObserver for NoopObserver {}

/// Observer that logs every notification through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

#[async_trait]
impl FlowObserver for LoggingObserver {
    async fn on_queue_position(&self, resource: ResourceId, position: &QueuePosition) {
        if position.purchasable {
            info!("[{}] Admitted", resource);
        } else {
            info!(
                "[{}] Waiting in queue: {} ahead (position {})",
                resource, position.relative, position.absolute
            );
        }
    }

    async fn on_recoverable_error(&self, resource: ResourceId, phase: &str, error: &ApiError) {
        warn!("[{}] {} poll failed, retrying: {}", resource, phase, error);
    }

    async fn on_reservation_ready(&self, resource: ResourceId, reservation: &Reservation) {
        let snapshot = &reservation.snapshot;
        info!(
            "[{}] Reserved {} for {} at {} ({} left)",
            resource,
            snapshot.ticket_name,
            snapshot.festival_title,
            snapshot.ticket_price,
            snapshot.remaining_quantity
        );
    }

    async fn on_payment_started(&self, resource: ResourceId, attempt: &PaymentAttempt) {
        info!("[{}] Payment {} started", resource, attempt.payment_id);
    }

    async fn on_payment_progress(&self, resource: ResourceId, attempt: &PaymentAttempt) {
        info!(
            "[{}] Payment {} pending ({}s)",
            resource,
            attempt.payment_id,
            attempt.elapsed.as_secs()
        );
    }

    async fn on_payment_outcome(&self, resource: ResourceId, outcome: &PaymentOutcome) {
        match outcome.failure() {
            Some(failure) => warn!("[{}] Payment ended: {}", resource, failure),
            None => info!("[{}] Payment ended: {}", resource, outcome.label()),
        }
    }

    async fn on_exit_flow(&self, resource: ResourceId) {
        info!("[{}] Purchase complete", resource);
    }
}
