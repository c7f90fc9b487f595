//! Conversion of queue admission into a purchase reservation.

mod client;
mod types;

pub use client::ReservationClient;
pub use types::{
    ConfirmedReservation, PurchaseSession, PurchaseSnapshot, Reservation, ReservationError,
    ReservationOutcome,
};
