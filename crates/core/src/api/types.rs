//! Wire types for the ticketing REST API.

use serde::{Deserialize, Serialize};

/// Success envelope: `{ "status": "SUCCESS", "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    pub data: T,
}

/// Error body: `{ "errorCode": "...", "message": "...", "data": ... }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Admission queue poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitOrderResponse {
    pub purchasable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_wait_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_wait_order: Option<u64>,
    /// Present when admission already opened a purchase session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_session: Option<String>,
}

/// Reservation check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasableResponse {
    pub purchasable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_session: Option<String>,
}

/// Snapshot of the ticket bound to a purchase session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePreviewResponse {
    pub festival_title: String,
    pub ticket_name: String,
    pub ticket_price: u64,
    pub remain_ticket_quantity: u64,
}

/// Payment start response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIdResponse {
    pub payment_id: String,
}

/// Payment status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    /// Anything this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Payment status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub payment_status: PaymentStatus,
}
