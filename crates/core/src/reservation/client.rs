//! Reservation client implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DomainError, TicketingApi};
use crate::config::ErrorCodes;
use crate::metrics;
use crate::queue::QueuePosition;
use crate::retry::{RetryError, RetryPolicy};
use crate::scheduler::CancelToken;
use crate::types::{FlowFailure, LoginRedirect, ResourceId};

use super::types::{
    PurchaseSession, PurchaseSnapshot, Reservation, ReservationError, ReservationOutcome,
};

/// Exchanges queue admission for a purchase session.
///
/// Holds at most one session per resource; asking again for a resource that
/// already has one returns the same token.
#[derive(Clone)]
pub struct ReservationClient {
    api: Arc<dyn TicketingApi>,
    error_codes: ErrorCodes,
    retry: RetryPolicy,
    held: Arc<RwLock<HashMap<ResourceId, PurchaseSession>>>,
}

impl ReservationClient {
    pub fn new(api: Arc<dyn TicketingApi>, error_codes: ErrorCodes, retry: RetryPolicy) -> Self {
        Self {
            api,
            error_codes,
            retry,
            held: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The session currently held for `resource`.
    pub async fn held_session(&self, resource: ResourceId) -> Option<PurchaseSession> {
        self.held.read().await.get(&resource).cloned()
    }

    /// Obtain a purchase session for an admitted caller.
    pub async fn reserve(
        &self,
        resource: ResourceId,
        admission: &QueuePosition,
    ) -> Result<PurchaseSession, ReservationError> {
        if let Some(session) = self.held_session(resource).await {
            debug!("Reusing held purchase session for {}", resource);
            metrics::RESERVATIONS.with_label_values(&["reused"]).inc();
            return Ok(session);
        }

        if let Some(token) = admission.purchase_session.clone() {
            debug!("Adopting purchase session issued with admission for {}", resource);
            metrics::RESERVATIONS.with_label_values(&["adopted"]).inc();
            return Ok(self.hold(resource, token).await);
        }

        let response = match self.api.check_purchasable(resource).await {
            Ok(response) => response,
            Err(e) => return self.recover_from_check_error(resource, e).await,
        };

        if !response.purchasable {
            info!("Backend refused a purchase session for {}", resource);
            return Err(ReservationError::NotPurchasable);
        }

        match response.purchase_session {
            Some(token) => {
                info!("Purchase session created for {}", resource);
                metrics::RESERVATIONS.with_label_values(&["created"]).inc();
                Ok(self.hold(resource, token).await)
            }
            None => Err(ReservationError::Recoverable(ApiError::ParseError(
                "purchasable response without purchaseSession".to_string(),
            ))),
        }
    }

    async fn recover_from_check_error(
        &self,
        resource: ResourceId,
        error: ApiError,
    ) -> Result<PurchaseSession, ReservationError> {
        match error.classify(&self.error_codes) {
            Some(DomainError::AlreadyReserved {
                session: Some(token),
            }) => {
                info!("Session already reserved for {}, reusing it", resource);
                metrics::RESERVATIONS.with_label_values(&["adopted"]).inc();
                Ok(self.hold(resource, token).await)
            }
            Some(DomainError::Unauthenticated) => Err(ReservationError::Redirect(
                LoginRedirect::for_resource(resource),
            )),
            Some(DomainError::AlreadyPurchased) => Err(ReservationError::AlreadyPurchased),
            Some(DomainError::OutsideSaleWindow) => Err(ReservationError::OutsideSaleWindow),
            _ => {
                warn!("Reservation check for {} failed: {}", resource, error);
                Err(ReservationError::Recoverable(error))
            }
        }
    }

    async fn hold(&self, resource: ResourceId, token: String) -> PurchaseSession {
        let session = PurchaseSession { token, resource };
        self.held.write().await.insert(resource, session.clone());
        session
    }

    /// Fetch the snapshot bound to `session`.
    ///
    /// A failure never invalidates the session.
    pub async fn fetch_snapshot(
        &self,
        session: &PurchaseSession,
    ) -> Result<PurchaseSnapshot, ApiError> {
        let preview = self
            .api
            .purchase_preview(session.resource, &session.token)
            .await?;
        Ok(PurchaseSnapshot::from(preview))
    }

    /// Re-fetch the snapshot of an existing reservation in place.
    pub async fn refresh_snapshot(&self, reservation: &mut Reservation) -> Result<(), ApiError> {
        reservation.snapshot = self.fetch_snapshot(&reservation.session).await?;
        debug!("Snapshot refreshed for {}", reservation.session.resource);
        Ok(())
    }

    /// Reserve and fetch the snapshot, retrying recoverable failures.
    pub async fn prepare(
        &self,
        resource: ResourceId,
        admission: &QueuePosition,
        cancel: &CancelToken,
    ) -> ReservationOutcome {
        let outcome = self.prepare_inner(resource, admission, cancel).await;
        match &outcome {
            ReservationOutcome::Ready(_) => info!("Reservation ready for {}", resource),
            other => {
                info!("Reservation for {} ended: {}", resource, other.label());
                metrics::RESERVATIONS.with_label_values(&[other.label()]).inc();
            }
        }
        outcome
    }

    async fn prepare_inner(
        &self,
        resource: ResourceId,
        admission: &QueuePosition,
        cancel: &CancelToken,
    ) -> ReservationOutcome {
        let reserved = self
            .retry
            .run(
                "reservation",
                cancel,
                || self.reserve(resource, admission),
                ReservationError::is_recoverable,
            )
            .await;

        let session = match reserved {
            Ok(session) => session,
            Err(RetryError::Cancelled) => return ReservationOutcome::Cancelled,
            Err(RetryError::Exhausted { last, .. }) => {
                return ReservationOutcome::Failed(FlowFailure::retry_budget_exhausted(
                    "reservation",
                    last,
                ))
            }
            Err(RetryError::Fatal(e)) => return Self::terminal(e),
        };

        let codes = &self.error_codes;
        let fetched = self
            .retry
            .run(
                "snapshot",
                cancel,
                || self.fetch_snapshot(&session),
                |e| !matches!(e.classify(codes), Some(DomainError::Unauthenticated)),
            )
            .await;

        match fetched {
            Ok(snapshot) => ReservationOutcome::Ready(Reservation { session, snapshot }),
            Err(RetryError::Cancelled) => ReservationOutcome::Cancelled,
            // Only a lost login stops the snapshot retries early.
            Err(RetryError::Fatal(_)) => {
                ReservationOutcome::Redirect(LoginRedirect::for_resource(resource))
            }
            Err(RetryError::Exhausted { last, .. }) => {
                ReservationOutcome::Failed(FlowFailure::retry_budget_exhausted("snapshot", last))
            }
        }
    }

    fn terminal(error: ReservationError) -> ReservationOutcome {
        match error {
            ReservationError::Redirect(redirect) => ReservationOutcome::Redirect(redirect),
            ReservationError::AlreadyPurchased => {
                ReservationOutcome::Failed(FlowFailure::already_purchased())
            }
            ReservationError::OutsideSaleWindow => {
                ReservationOutcome::Failed(FlowFailure::outside_sale_window())
            }
            ReservationError::NotPurchasable => {
                ReservationOutcome::Failed(FlowFailure::not_purchasable())
            }
            ReservationError::Recoverable(e) => {
                ReservationOutcome::Failed(FlowFailure::retry_budget_exhausted("reservation", e))
            }
        }
    }

    /// Forget the session held for `resource`.
    pub async fn release(&self, resource: ResourceId) {
        if self.held.write().await.remove(&resource).is_some() {
            debug!("Released purchase session for {}", resource);
        }
    }
}
