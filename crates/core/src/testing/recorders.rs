//! Scripted confirmer and recording observer.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::api::ApiError;
use crate::flow::{FlowObserver, PurchaseConfirmer};
use crate::payment::{PaymentAttempt, PaymentOutcome};
use crate::queue::QueuePosition;
use crate::reservation::{PurchaseSnapshot, Reservation};
use crate::types::ResourceId;

/// Confirmer answering from a fixed decision and a script of retry answers.
///
/// Once the retry script is exhausted every further retry is declined.
#[derive(Debug, Clone)]
pub struct ScriptedConfirmer {
    confirm: bool,
    retries: Arc<RwLock<VecDeque<bool>>>,
    confirmed_snapshots: Arc<RwLock<Vec<PurchaseSnapshot>>>,
    retry_prompts: Arc<RwLock<Vec<&'static str>>>,
}

impl ScriptedConfirmer {
    /// Confirm the purchase and decline every retry.
    pub fn approve() -> Self {
        Self::new(true, Vec::new())
    }

    /// Decline the purchase.
    pub fn decline() -> Self {
        Self::new(false, Vec::new())
    }

    pub fn new(confirm: bool, retries: Vec<bool>) -> Self {
        Self {
            confirm,
            retries: Arc::new(RwLock::new(retries.into())),
            confirmed_snapshots: Arc::new(RwLock::new(Vec::new())),
            retry_prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshots the buyer was asked to confirm.
    pub async fn confirmed_snapshots(&self) -> Vec<PurchaseSnapshot> {
        self.confirmed_snapshots.read().await.clone()
    }

    /// Labels of the payment outcomes a retry was offered for.
    pub async fn retry_prompts(&self) -> Vec<&'static str> {
        self.retry_prompts.read().await.clone()
    }
}

#[async_trait]
impl PurchaseConfirmer for ScriptedConfirmer {
    async fn confirm_purchase(&self, _resource: ResourceId, snapshot: &PurchaseSnapshot) -> bool {
        self.confirmed_snapshots.write().await.push(snapshot.clone());
        self.confirm
    }

    async fn retry_payment(&self, _resource: ResourceId, outcome: &PaymentOutcome) -> bool {
        self.retry_prompts.write().await.push(outcome.label());
        self.retries.write().await.pop_front().unwrap_or(false)
    }
}

/// A notification received by [`RecordingObserver`].
#[derive(Debug, Clone)]
pub enum FlowEvent {
    QueuePosition(QueuePosition),
    RecoverableError { phase: String, message: String },
    ReservationReady(Reservation),
    PaymentStarted(PaymentAttempt),
    PaymentProgress(PaymentAttempt),
    PaymentOutcome(PaymentOutcome),
    ExitFlow,
}

/// Observer that records every notification with its tokio clock time.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<RwLock<Vec<(tokio::time::Instant, FlowEvent)>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<FlowEvent> {
        self.events
            .read()
            .await
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Events with the time they were received.
    pub async fn timed_events(&self) -> Vec<(tokio::time::Instant, FlowEvent)> {
        self.events.read().await.clone()
    }

    /// Relative positions reported by the queue, in order.
    pub async fn relative_positions(&self) -> Vec<i64> {
        self.events()
            .await
            .into_iter()
            .filter_map(|e| match e {
                FlowEvent::QueuePosition(p) => Some(p.relative),
                _ => None,
            })
            .collect()
    }

    pub async fn exit_count(&self) -> usize {
        self.events()
            .await
            .iter()
            .filter(|e| matches!(e, FlowEvent::ExitFlow))
            .count()
    }

    async fn push(&self, event: FlowEvent) {
        self.events
            .write()
            .await
            .push((tokio::time::Instant::now(), event));
    }
}

#[async_trait]
impl FlowObserver for RecordingObserver {
    async fn on_queue_position(&self, _resource: ResourceId, position: &QueuePosition) {
        self.push(FlowEvent::QueuePosition(position.clone())).await;
    }

    async fn on_recoverable_error(&self, _resource: ResourceId, phase: &str, error: &ApiError) {
        self.push(FlowEvent::RecoverableError {
            phase: phase.to_string(),
            message: error.to_string(),
        })
        .await;
    }

    async fn on_reservation_ready(&self, _resource: ResourceId, reservation: &Reservation) {
        self.push(FlowEvent::ReservationReady(reservation.clone()))
            .await;
    }

    async fn on_payment_started(&self, _resource: ResourceId, attempt: &PaymentAttempt) {
        self.push(FlowEvent::PaymentStarted(attempt.clone())).await;
    }

    async fn on_payment_progress(&self, _resource: ResourceId, attempt: &PaymentAttempt) {
        self.push(FlowEvent::PaymentProgress(attempt.clone())).await;
    }

    async fn on_payment_outcome(&self, _resource: ResourceId, outcome: &PaymentOutcome) {
        self.push(FlowEvent::PaymentOutcome(outcome.clone())).await;
    }

    async fn on_exit_flow(&self, _resource: ResourceId) {
        self.push(FlowEvent::ExitFlow).await;
    }
}
