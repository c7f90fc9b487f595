//! Ticketing backend API abstraction.
//!
//! This module provides the `TicketingApi` trait consumed by the queue,
//! reservation and payment phases, plus the reqwest-backed implementation.

mod http;
mod types;

pub use http::HttpTicketingApi;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ErrorCodes;
use crate::types::ResourceId;

/// Errors returned by a single API call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Network-level failure (DNS, refused connection, reset).
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timeout")]
    Timeout,

    /// Non-2xx response without a domain error code.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Non-2xx response carrying a backend error code.
    #[error("API error {code} (HTTP {status}): {message}")]
    Domain {
        status: u16,
        code: String,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The response body could not be decoded.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The client could not be built.
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl ApiError {
    /// HTTP status of the response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } | ApiError::Domain { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend error code, if the response carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Domain { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Map the error onto the domain outcomes the flow reacts to.
    ///
    /// Returns `None` for transport failures, which are always recoverable.
    pub fn classify(&self, codes: &ErrorCodes) -> Option<DomainError> {
        if let Some(code) = self.code() {
            if code == codes.unauthenticated {
                return Some(DomainError::Unauthenticated);
            }
            if code == codes.already_reserved {
                return Some(DomainError::AlreadyReserved {
                    session: self.payload_session(),
                });
            }
            if code == codes.already_purchased {
                return Some(DomainError::AlreadyPurchased);
            }
            if code == codes.outside_sale_window {
                return Some(DomainError::OutsideSaleWindow);
            }
            if code == codes.sold_out {
                return Some(DomainError::SoldOut);
            }
            if code == codes.payment_not_found {
                return Some(DomainError::NotFound);
            }
        }

        match self.status() {
            Some(401) => Some(DomainError::Unauthenticated),
            Some(404) => Some(DomainError::NotFound),
            _ => None,
        }
    }

    fn payload_session(&self) -> Option<String> {
        match self {
            ApiError::Domain {
                data: Some(data), ..
            } => data
                .get("purchaseSession")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Backend answers that carry meaning beyond "try again".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    Unauthenticated,
    /// A session is already held; the payload may name it.
    AlreadyReserved { session: Option<String> },
    AlreadyPurchased,
    OutsideSaleWindow,
    SoldOut,
    /// Unknown or expired entity (e.g. a payment attempt).
    NotFound,
}

/// The REST contract consumed by the purchase flow.
///
/// Implementations must not pipeline requests; callers guarantee at most one
/// request per endpoint is in flight.
#[async_trait]
pub trait TicketingApi: Send + Sync {
    /// `GET /festivals/{f}/tickets/{t}/purchase/wait[?waitOrder=]`
    async fn wait_order(
        &self,
        resource: ResourceId,
        anchor: Option<u64>,
    ) -> Result<WaitOrderResponse, ApiError>;

    /// `GET /festivals/{f}/tickets/{t}/purchase/check`
    async fn check_purchasable(
        &self,
        resource: ResourceId,
    ) -> Result<PurchasableResponse, ApiError>;

    /// `GET /festivals/{f}/tickets/{t}/purchase/{session}`
    async fn purchase_preview(
        &self,
        resource: ResourceId,
        session: &str,
    ) -> Result<PurchasePreviewResponse, ApiError>;

    /// `POST /festivals/{f}/tickets/{t}/purchase`
    async fn start_payment(&self, resource: ResourceId) -> Result<PaymentIdResponse, ApiError>;

    /// `GET /festivals/{f}/tickets/{t}/purchase/{paymentId}/status`
    async fn payment_status(
        &self,
        resource: ResourceId,
        payment_id: &str,
    ) -> Result<PaymentStatusResponse, ApiError>;
}
