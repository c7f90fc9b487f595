//! Queue client implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::anchor::PositionAnchorStore;
use crate::api::{DomainError, TicketingApi};
use crate::config::{ErrorCodes, QueueConfig};
use crate::flow::FlowObserver;
use crate::metrics;
use crate::retry::{RetryBudget, RetryPolicy};
use crate::scheduler::{spawn_repeating, CancelToken, Tick};
use crate::types::{FlowFailure, LoginRedirect, ResourceId};

use super::types::{QueueOutcome, QueuePoll, QueuePosition};

/// Per-run state shared between ticks of the polling loop.
struct LoopState {
    budget: RetryBudget,
    outcome: Option<QueueOutcome>,
}

/// Polls the admission queue for one or more resources.
///
/// Cloning yields another handle sharing the same anchor store and in-flight
/// gates, so at most one poll per resource is ever outstanding.
#[derive(Clone)]
pub struct QueueClient {
    api: Arc<dyn TicketingApi>,
    anchors: PositionAnchorStore,
    config: QueueConfig,
    error_codes: ErrorCodes,
    retry: RetryPolicy,
    in_flight: Arc<RwLock<HashMap<ResourceId, Arc<Mutex<()>>>>>,
}

impl QueueClient {
    pub fn new(
        api: Arc<dyn TicketingApi>,
        anchors: PositionAnchorStore,
        config: QueueConfig,
        error_codes: ErrorCodes,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            anchors,
            config,
            error_codes,
            retry,
            in_flight: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn anchors(&self) -> &PositionAnchorStore {
        &self.anchors
    }

    /// Poll the queue once.
    ///
    /// Returns [`QueuePoll::Skipped`] without touching the network when a
    /// poll for the same resource is still in flight.
    pub async fn poll(&self, resource: ResourceId) -> QueuePoll {
        let gate = {
            let mut gates = self.in_flight.write().await;
            Arc::clone(gates.entry(resource).or_default())
        };

        let _guard = match gate.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Queue poll {} skipped: previous poll still in flight", resource);
                metrics::QUEUE_POLLS_SKIPPED.inc();
                return QueuePoll::Skipped;
            }
        };

        let poll = self.poll_once(resource).await;
        metrics::QUEUE_POLLS.with_label_values(&[poll.label()]).inc();
        poll
    }

    async fn poll_once(&self, resource: ResourceId) -> QueuePoll {
        let anchor = self.anchors.get(resource).await;

        let response = match self.api.wait_order(resource, anchor).await {
            Ok(response) => response,
            Err(e) => {
                return match e.classify(&self.error_codes) {
                    Some(DomainError::SoldOut) => {
                        self.anchors.delete(resource).await;
                        info!("Resource {} sold out while queued", resource);
                        QueuePoll::SoldOut
                    }
                    Some(DomainError::Unauthenticated) => {
                        info!("Queue poll {} requires login", resource);
                        QueuePoll::Redirect(LoginRedirect::for_resource(resource))
                    }
                    _ => {
                        warn!("Queue poll {} failed: {}", resource, e);
                        QueuePoll::Recoverable(e)
                    }
                };
            }
        };

        let absolute = match (anchor, response.absolute_wait_order) {
            (Some(cached), reported) => {
                if reported.is_some_and(|r| r != cached) {
                    debug!(
                        "Queue poll {}: backend reported absolute {:?}, keeping anchor {}",
                        resource, reported, cached
                    );
                }
                cached
            }
            (None, Some(assigned)) => {
                if !response.purchasable {
                    self.anchors.set(resource, assigned).await;
                    debug!("Queue anchor {} assigned for {}", assigned, resource);
                }
                assigned
            }
            (None, None) => 0,
        };

        let position = QueuePosition {
            absolute,
            relative: response.relative_wait_order.unwrap_or(0),
            purchasable: response.purchasable,
            purchase_session: response.purchase_session,
        };

        if position.purchasable {
            self.anchors.delete(resource).await;
            info!("Admitted from queue for {}", resource);
            QueuePoll::Admitted(position)
        } else {
            debug!(
                "Queue poll {}: relative={} absolute={}",
                resource, position.relative, position.absolute
            );
            QueuePoll::Waiting(position)
        }
    }

    /// Poll immediately and then every `queue.poll_interval_ms` until the
    /// queue phase ends or `cancel` fires.
    ///
    /// Cancellation keeps the anchor so a later run resumes at the same
    /// position.
    pub async fn run(
        &self,
        resource: ResourceId,
        observer: Arc<dyn FlowObserver>,
        cancel: &CancelToken,
    ) -> QueueOutcome {
        info!("Queue polling started for {}", resource);

        let state = Arc::new(Mutex::new(LoopState {
            budget: self.retry.budget(),
            outcome: None,
        }));

        let client = self.clone();
        let tick_state = Arc::clone(&state);
        let handle = spawn_repeating(cancel, self.config.poll_interval(), move || {
            let client = client.clone();
            let observer = Arc::clone(&observer);
            let state = Arc::clone(&tick_state);
            async move { client.tick(resource, observer.as_ref(), &state).await }
        });
        handle.join().await;

        let outcome = state.lock().await.outcome.take();
        match outcome {
            Some(outcome) => {
                self.forget_gate(resource).await;
                outcome
            }
            None => {
                info!("Queue polling cancelled for {}", resource);
                QueueOutcome::Cancelled
            }
        }
    }

    async fn tick(
        &self,
        resource: ResourceId,
        observer: &dyn FlowObserver,
        state: &Mutex<LoopState>,
    ) -> Tick {
        let outcome = match self.poll(resource).await {
            QueuePoll::Skipped => return Tick::Continue,
            QueuePoll::Waiting(position) => {
                state.lock().await.budget.record_success();
                observer.on_queue_position(resource, &position).await;
                return Tick::Continue;
            }
            QueuePoll::Admitted(position) => {
                observer.on_queue_position(resource, &position).await;
                QueueOutcome::Admitted(position)
            }
            QueuePoll::SoldOut => QueueOutcome::SoldOut,
            QueuePoll::Redirect(redirect) => QueueOutcome::Redirect(redirect),
            QueuePoll::Recoverable(error) => {
                observer.on_recoverable_error(resource, "queue", &error).await;
                let exhausted = state.lock().await.budget.record_failure();
                if !exhausted {
                    return Tick::Continue;
                }
                warn!("Queue polling for {} gave up: {}", resource, error);
                QueueOutcome::Failed(FlowFailure::retry_budget_exhausted("queue", &error))
            }
        };

        state.lock().await.outcome = Some(outcome);
        Tick::Stop
    }

    /// Forget the queue position for `resource`.
    ///
    /// Called when the caller leaves the flow for good; a later run re-queues.
    pub async fn abandon(&self, resource: ResourceId) {
        self.forget_gate(resource).await;
        if let Some(anchor) = self.anchors.delete(resource).await {
            info!("Abandoned queue anchor {} for {}", anchor, resource);
        }
    }

    /// Drop the in-flight gate for `resource` unless a poll still holds it.
    async fn forget_gate(&self, resource: ResourceId) {
        let mut gates = self.in_flight.write().await;
        if gates
            .get(&resource)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&resource);
        }
    }
}
