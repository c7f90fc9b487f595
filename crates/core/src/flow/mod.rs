//! The complete purchase flow.
//!
//! A [`TicketFlow`] runs queue, reservation, confirmation and payment in
//! sequence for one resource:
//! - **Queue**: polled until admission, sold out, or login is required
//! - **Reservation**: a purchase session plus its snapshot
//! - **Confirmation**: the [`PurchaseConfirmer`] approves the snapshot
//! - **Payment**: attempts until success, or until the confirmer stops retrying

mod observer;
mod runner;
mod types;

pub use observer::{FlowObserver, LoggingObserver, NoopObserver, PurchaseConfirmer};
pub use runner::TicketFlow;
pub use types::FlowOutcome;
