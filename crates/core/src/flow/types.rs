//! Types for the purchase flow.

use crate::payment::PaymentAttempt;
use crate::types::{FlowFailure, LoginRedirect};

/// How a purchase flow ended.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// The payment succeeded.
    Purchased(PaymentAttempt),
    SoldOut,
    /// The caller must log in and return to the purchase page.
    Redirect(LoginRedirect),
    Failed(FlowFailure),
    /// The buyer did not confirm the purchase.
    Declined,
    Cancelled,
}

impl FlowOutcome {
    pub fn is_purchased(&self) -> bool {
        matches!(self, FlowOutcome::Purchased(_))
    }
}
