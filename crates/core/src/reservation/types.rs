//! Types for the reservation phase.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiError, PurchasePreviewResponse};
use crate::types::{FlowFailure, LoginRedirect, ResourceId};

/// A time-limited hold on inventory.
///
/// The backend expires sessions on its own; the client never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseSession {
    pub token: String,
    pub resource: ResourceId,
}

/// What the caller is about to buy, as seen when the snapshot was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseSnapshot {
    pub festival_title: String,
    pub ticket_name: String,
    pub ticket_price: u64,
    pub remaining_quantity: u64,
}

impl From<PurchasePreviewResponse> for PurchaseSnapshot {
    fn from(preview: PurchasePreviewResponse) -> Self {
        Self {
            festival_title: preview.festival_title,
            ticket_name: preview.ticket_name,
            ticket_price: preview.ticket_price,
            remaining_quantity: preview.remain_ticket_quantity,
        }
    }
}

/// A session together with its snapshot, awaiting the buyer's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub session: PurchaseSession,
    pub snapshot: PurchaseSnapshot,
}

impl Reservation {
    /// Record the buyer's explicit approval.
    ///
    /// This is the only way to obtain a [`ConfirmedReservation`], which in
    /// turn is the only thing a payment can be started for.
    pub fn confirm(self) -> ConfirmedReservation {
        ConfirmedReservation {
            session: self.session,
            snapshot: self.snapshot,
        }
    }
}

/// A reservation the buyer agreed to pay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedReservation {
    session: PurchaseSession,
    snapshot: PurchaseSnapshot,
}

impl ConfirmedReservation {
    pub fn session(&self) -> &PurchaseSession {
        &self.session
    }

    pub fn snapshot(&self) -> &PurchaseSnapshot {
        &self.snapshot
    }

    pub fn resource(&self) -> ResourceId {
        self.session.resource
    }
}

/// Why a reservation could not be made.
#[derive(Debug, Clone, Error)]
pub enum ReservationError {
    #[error("login required")]
    Redirect(LoginRedirect),

    #[error("ticket already purchased")]
    AlreadyPurchased,

    #[error("outside the sale window")]
    OutsideSaleWindow,

    #[error("ticket not purchasable")]
    NotPurchasable,

    #[error("{0}")]
    Recoverable(ApiError),
}

impl ReservationError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReservationError::Recoverable(_))
    }
}

/// How the reservation phase ended.
#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    Ready(Reservation),
    Redirect(LoginRedirect),
    Failed(FlowFailure),
    Cancelled,
}

impl ReservationOutcome {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ReservationOutcome::Ready(_) => "ready",
            ReservationOutcome::Redirect(_) => "redirect",
            ReservationOutcome::Failed(failure) if failure.retryable => "error",
            ReservationOutcome::Failed(_) => "terminal",
            ReservationOutcome::Cancelled => "cancelled",
        }
    }
}
