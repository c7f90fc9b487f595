//! Ticket flow runner.

use std::sync::Arc;

use tracing::info;

use crate::anchor::PositionAnchorStore;
use crate::api::TicketingApi;
use crate::config::Config;
use crate::payment::{PaymentOrchestrator, PaymentOutcome};
use crate::queue::{QueueClient, QueueOutcome};
use crate::reservation::{ReservationClient, ReservationOutcome};
use crate::retry::RetryPolicy;
use crate::scheduler::CancelToken;
use crate::types::{FlowFailure, ResourceId};

use super::observer::{FlowObserver, PurchaseConfirmer};
use super::types::FlowOutcome;

/// Runs complete purchase flows against one backend.
pub struct TicketFlow {
    queue: QueueClient,
    reservations: ReservationClient,
    payments: PaymentOrchestrator,
}

impl TicketFlow {
    /// Build the three phase clients from configuration.
    ///
    /// `anchors` outlives any single flow so that re-entering the flow for
    /// the same resource resumes at the same queue position.
    pub fn new(api: Arc<dyn TicketingApi>, anchors: PositionAnchorStore, config: &Config) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            queue: QueueClient::new(
                Arc::clone(&api),
                anchors,
                config.queue.clone(),
                config.error_codes.clone(),
                retry.clone(),
            ),
            reservations: ReservationClient::new(
                Arc::clone(&api),
                config.error_codes.clone(),
                retry.clone(),
            ),
            payments: PaymentOrchestrator::new(
                api,
                config.payment.clone(),
                config.error_codes.clone(),
                retry,
            ),
        }
    }

    pub fn queue(&self) -> &QueueClient {
        &self.queue
    }

    pub fn payments(&self) -> &PaymentOrchestrator {
        &self.payments
    }

    /// Run one purchase flow for `resource`.
    ///
    /// Every timer the flow starts is cancelled before this returns, and any
    /// session it held is released.
    pub async fn run(
        &self,
        resource: ResourceId,
        confirmer: &dyn PurchaseConfirmer,
        observer: Arc<dyn FlowObserver>,
        cancel: &CancelToken,
    ) -> FlowOutcome {
        info!("Purchase flow started for {}", resource);
        let flow_cancel = cancel.child();

        let outcome = self
            .run_phases(resource, confirmer, observer, &flow_cancel)
            .await;

        flow_cancel.cancel();
        self.reservations.release(resource).await;
        info!("Purchase flow for {} ended: {:?}", resource, outcome);
        outcome
    }

    async fn run_phases(
        &self,
        resource: ResourceId,
        confirmer: &dyn PurchaseConfirmer,
        observer: Arc<dyn FlowObserver>,
        cancel: &CancelToken,
    ) -> FlowOutcome {
        let admission = match self.queue.run(resource, Arc::clone(&observer), cancel).await {
            QueueOutcome::Admitted(position) => position,
            QueueOutcome::SoldOut => return FlowOutcome::SoldOut,
            QueueOutcome::Redirect(redirect) => return FlowOutcome::Redirect(redirect),
            QueueOutcome::Failed(failure) => return FlowOutcome::Failed(failure),
            QueueOutcome::Cancelled => return FlowOutcome::Cancelled,
        };

        let reservation = match self.reservations.prepare(resource, &admission, cancel).await {
            ReservationOutcome::Ready(reservation) => reservation,
            ReservationOutcome::Redirect(redirect) => return FlowOutcome::Redirect(redirect),
            ReservationOutcome::Failed(failure) => return FlowOutcome::Failed(failure),
            ReservationOutcome::Cancelled => return FlowOutcome::Cancelled,
        };
        observer.on_reservation_ready(resource, &reservation).await;

        let approved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return FlowOutcome::Cancelled,
            approved = confirmer.confirm_purchase(resource, &reservation.snapshot) => approved,
        };
        if !approved {
            info!("Purchase of {} declined", resource);
            return FlowOutcome::Declined;
        }
        let confirmed = reservation.confirm();

        loop {
            let outcome = self
                .payments
                .run_attempt(&confirmed, Arc::clone(&observer), cancel)
                .await;

            let failure = match &outcome {
                PaymentOutcome::Success(attempt) => return FlowOutcome::Purchased(attempt.clone()),
                PaymentOutcome::Redirect(redirect) => return FlowOutcome::Redirect(redirect.clone()),
                PaymentOutcome::Cancelled => return FlowOutcome::Cancelled,
                other => other
                    .failure()
                    .unwrap_or_else(|| FlowFailure::protocol("Payment ended without a result")),
            };

            if !failure.retryable {
                return FlowOutcome::Failed(failure);
            }

            let retry = tokio::select! {
                biased;
                _ = cancel.cancelled() => return FlowOutcome::Cancelled,
                retry = confirmer.retry_payment(resource, &outcome) => retry,
            };
            if !retry {
                return FlowOutcome::Failed(failure);
            }
            info!("Retrying payment for {} with a new attempt", resource);
        }
    }
}
