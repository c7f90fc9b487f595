//! Payment orchestrator implementation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{ApiError, DomainError, PaymentStatus, TicketingApi};
use crate::config::{ErrorCodes, PaymentConfig};
use crate::flow::FlowObserver;
use crate::metrics;
use crate::reservation::ConfirmedReservation;
use crate::retry::{RetryBudget, RetryPolicy};
use crate::scheduler::{sleep_or_cancel, spawn_repeating_after, CancelToken, Tick};
use crate::types::{FlowFailure, LoginRedirect, ResourceId};

use super::types::{PaymentAttempt, PaymentOutcome, PaymentState, TimeoutReason};

/// State shared between status polls of one attempt.
struct PollState {
    attempt: PaymentAttempt,
    budget: RetryBudget,
    outcome: Option<PaymentOutcome>,
}

/// What a single status poll decided.
enum Verdict {
    Pending,
    Redirect,
    Retry(ApiError),
    Success,
    Failed(Option<FlowFailure>),
    Timeout(TimeoutReason),
}

/// Drives payment attempts for confirmed reservations.
///
/// Remembers every payment id it has seen so a backend handing one back
/// twice is caught as a protocol error.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    api: Arc<dyn TicketingApi>,
    config: PaymentConfig,
    error_codes: ErrorCodes,
    retry: RetryPolicy,
    state: Arc<RwLock<PaymentState>>,
    history: Arc<RwLock<Vec<PaymentAttempt>>>,
    seen_ids: Arc<RwLock<HashSet<String>>>,
}

impl PaymentOrchestrator {
    pub fn new(
        api: Arc<dyn TicketingApi>,
        config: PaymentConfig,
        error_codes: ErrorCodes,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            config,
            error_codes,
            retry,
            state: Arc::new(RwLock::new(PaymentState::Idle)),
            history: Arc::new(RwLock::new(Vec::new())),
            seen_ids: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// State of the most recent attempt.
    ///
    /// Stays `Pending` when observation was cancelled mid-attempt, since the
    /// backend keeps processing it.
    pub async fn state(&self) -> PaymentState {
        *self.state.read().await
    }

    /// Every finished attempt, oldest first.
    pub async fn attempts(&self) -> Vec<PaymentAttempt> {
        self.history.read().await.clone()
    }

    /// Start a fresh attempt and follow it to a terminal outcome.
    ///
    /// On success the call returns after the configured exit delay, having
    /// notified `observer` exactly once, unless `cancel` fires first.
    pub async fn run_attempt(
        &self,
        reservation: &ConfirmedReservation,
        observer: Arc<dyn FlowObserver>,
        cancel: &CancelToken,
    ) -> PaymentOutcome {
        let resource = reservation.resource();

        let outcome = match self.start(resource, cancel).await {
            Ok(attempt) => {
                observer.on_payment_started(resource, &attempt).await;
                self.follow(resource, attempt, Arc::clone(&observer), cancel)
                    .await
            }
            Err(outcome) => outcome,
        };

        self.record(resource, &outcome).await;
        observer.on_payment_outcome(resource, &outcome).await;

        if let PaymentOutcome::Success(_) = outcome {
            let delay = self.config.success_redirect_delay();
            if sleep_or_cancel(cancel, delay).await {
                info!("Leaving purchase flow for {}", resource);
                observer.on_exit_flow(resource).await;
            } else {
                debug!("Exit after payment for {} cancelled", resource);
            }
        }

        outcome
    }

    /// Send the start request exactly once.
    ///
    /// The request is not idempotent: a lost answer may still have created an
    /// attempt, so a new one is only started when the buyer asks for it.
    async fn start(
        &self,
        resource: ResourceId,
        cancel: &CancelToken,
    ) -> Result<PaymentAttempt, PaymentOutcome> {
        *self.state.write().await = PaymentState::Idle;

        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PaymentOutcome::Cancelled),
            started = self.api.start_payment(resource) => started,
        };

        let payment_id = match started {
            Ok(response) => response.payment_id,
            Err(e) => {
                warn!("Payment start for {} failed: {}", resource, e);
                let failure = match e.classify(&self.error_codes) {
                    Some(DomainError::Unauthenticated) => {
                        return Err(PaymentOutcome::Redirect(LoginRedirect::for_resource(
                            resource,
                        )))
                    }
                    Some(DomainError::AlreadyPurchased) => FlowFailure::already_purchased(),
                    Some(DomainError::OutsideSaleWindow) => FlowFailure::outside_sale_window(),
                    Some(_) => {
                        FlowFailure::protocol(format!("Payment could not be started: {}", e))
                    }
                    None => FlowFailure::payment_not_started(&e),
                };
                return Err(PaymentOutcome::Failed {
                    attempt: None,
                    failure: Some(failure),
                });
            }
        };

        if !self.seen_ids.write().await.insert(payment_id.clone()) {
            warn!("Backend reused payment id {} for {}", payment_id, resource);
            return Err(PaymentOutcome::Failed {
                attempt: None,
                failure: Some(FlowFailure::protocol(format!(
                    "Payment id {} was already used by an earlier attempt",
                    payment_id
                ))),
            });
        }

        *self.state.write().await = PaymentState::Pending;
        info!("Payment {} started for {}", payment_id, resource);
        Ok(PaymentAttempt::new(payment_id))
    }

    /// Poll the attempt's status every `payment.poll_interval_ms` until it
    /// reaches a terminal state or `cancel` fires.
    async fn follow(
        &self,
        resource: ResourceId,
        attempt: PaymentAttempt,
        observer: Arc<dyn FlowObserver>,
        cancel: &CancelToken,
    ) -> PaymentOutcome {
        let state = Arc::new(Mutex::new(PollState {
            attempt,
            budget: self.retry.budget(),
            outcome: None,
        }));

        let orchestrator = self.clone();
        let tick_state = Arc::clone(&state);
        let handle = spawn_repeating_after(cancel, self.config.poll_interval(), move || {
            let orchestrator = orchestrator.clone();
            let observer = Arc::clone(&observer);
            let state = Arc::clone(&tick_state);
            async move { orchestrator.tick(resource, observer.as_ref(), &state).await }
        });
        handle.join().await;

        let outcome = state.lock().await.outcome.take();
        outcome.unwrap_or(PaymentOutcome::Cancelled)
    }

    async fn tick(
        &self,
        resource: ResourceId,
        observer: &dyn FlowObserver,
        state: &Mutex<PollState>,
    ) -> Tick {
        let (payment_id, elapsed) = {
            let mut st = state.lock().await;
            st.attempt.elapsed += self.config.poll_interval();
            st.attempt.polls += 1;
            (st.attempt.payment_id.clone(), st.attempt.elapsed)
        };
        let at_ceiling = elapsed >= self.config.timeout();

        let result = self.api.payment_status(resource, &payment_id).await;

        let mut st = state.lock().await;
        let verdict = match result {
            Ok(response) => {
                st.budget.record_success();
                match response.payment_status {
                    PaymentStatus::Success => Verdict::Success,
                    PaymentStatus::Failed => Verdict::Failed(None),
                    PaymentStatus::Pending | PaymentStatus::Unknown if at_ceiling => {
                        Verdict::Timeout(TimeoutReason::Ceiling)
                    }
                    status => {
                        debug!(
                            "Payment {} still {:?} after {:?}",
                            payment_id, status, elapsed
                        );
                        Verdict::Pending
                    }
                }
            }
            Err(e) => match e.classify(&self.error_codes) {
                Some(DomainError::Unauthenticated) => {
                    info!("Payment status poll {} requires login", payment_id);
                    Verdict::Redirect
                }
                Some(DomainError::NotFound) => Verdict::Timeout(TimeoutReason::Expired),
                _ if at_ceiling => Verdict::Timeout(TimeoutReason::Ceiling),
                _ => {
                    warn!("Payment status poll {} failed: {}", payment_id, e);
                    if st.budget.record_failure() {
                        Verdict::Failed(Some(FlowFailure::retry_budget_exhausted(
                            "payment status",
                            &e,
                        )))
                    } else {
                        Verdict::Retry(e)
                    }
                }
            },
        };

        let outcome = match verdict {
            Verdict::Pending => {
                let attempt = st.attempt.clone();
                drop(st);
                observer.on_payment_progress(resource, &attempt).await;
                return Tick::Continue;
            }
            Verdict::Retry(error) => {
                drop(st);
                observer
                    .on_recoverable_error(resource, "payment", &error)
                    .await;
                return Tick::Continue;
            }
            Verdict::Redirect => PaymentOutcome::Redirect(LoginRedirect::for_resource(resource)),
            Verdict::Success => {
                st.attempt.state = PaymentState::Success;
                PaymentOutcome::Success(st.attempt.clone())
            }
            Verdict::Failed(failure) => {
                st.attempt.state = PaymentState::Failed;
                PaymentOutcome::Failed {
                    attempt: Some(st.attempt.clone()),
                    failure,
                }
            }
            Verdict::Timeout(reason) => {
                st.attempt.state = PaymentState::Timeout;
                PaymentOutcome::Timeout {
                    attempt: st.attempt.clone(),
                    reason,
                }
            }
        };

        st.outcome = Some(outcome);
        Tick::Stop
    }

    async fn record(&self, resource: ResourceId, outcome: &PaymentOutcome) {
        let next = match outcome {
            PaymentOutcome::Success(_) => Some(PaymentState::Success),
            PaymentOutcome::Failed { .. } => Some(PaymentState::Failed),
            PaymentOutcome::Timeout { .. } => Some(PaymentState::Timeout),
            PaymentOutcome::Redirect(_) | PaymentOutcome::Cancelled => None,
        };
        if let Some(next) = next {
            *self.state.write().await = next;
        }

        let label = outcome.label();
        if let Some(attempt) = outcome.attempt() {
            metrics::PAYMENT_DURATION
                .with_label_values(&[label])
                .observe(attempt.elapsed.as_secs_f64());
            self.history.write().await.push(attempt.clone());
        }
        metrics::PAYMENT_ATTEMPTS.with_label_values(&[label]).inc();
        info!("Payment attempt for {} ended: {}", resource, label);
    }
}
