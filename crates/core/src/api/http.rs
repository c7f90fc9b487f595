//! reqwest implementation of the ticketing API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::types::ResourceId;

use super::{
    ApiEnvelope, ApiError, ApiErrorBody, PaymentIdResponse, PaymentStatusResponse,
    PurchasePreviewResponse, PurchasableResponse, TicketingApi, WaitOrderResponse,
};

/// HTTP client for the ticketing backend.
///
/// Authentication rides on the session cookie: either the one configured in
/// `ApiConfig::session_cookie` or whatever the cookie store picks up.
pub struct HttpTicketingApi {
    client: Client,
    base_url: String,
}

impl HttpTicketingApi {
    /// Create a new client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::NotConfigured(format!("invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::NotConfigured(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn purchase_url(&self, resource: ResourceId) -> String {
        format!(
            "{}/festivals/{}/tickets/{}/purchase",
            self.base_url, resource.festival_id, resource.ticket_id
        )
    }

    /// Send a request and decode the `data` field of the success envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let envelope: ApiEnvelope<T> = response
                .json()
                .await
                .map_err(|e| ApiError::ParseError(e.to_string()))?;
            return Ok(envelope.data);
        }

        let body = response.text().await.unwrap_or_default();
        let error_body: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();

        match error_body.error_code {
            Some(code) => Err(ApiError::Domain {
                status: status.as_u16(),
                code,
                message: error_body.message.unwrap_or_default(),
                data: error_body.data,
            }),
            None => Err(ApiError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            }),
        }
    }
}

#[async_trait]
impl TicketingApi for HttpTicketingApi {
    async fn wait_order(
        &self,
        resource: ResourceId,
        anchor: Option<u64>,
    ) -> Result<WaitOrderResponse, ApiError> {
        let url = format!("{}/wait", self.purchase_url(resource));
        debug!("Queue poll {}: anchor={:?}", resource, anchor);

        let mut request = self.client.get(&url);
        if let Some(absolute) = anchor {
            request = request.query(&[("waitOrder", absolute)]);
        }
        self.send(request).await
    }

    async fn check_purchasable(
        &self,
        resource: ResourceId,
    ) -> Result<PurchasableResponse, ApiError> {
        let url = format!("{}/check", self.purchase_url(resource));
        debug!("Reservation check {}", resource);
        self.send(self.client.get(&url)).await
    }

    async fn purchase_preview(
        &self,
        resource: ResourceId,
        session: &str,
    ) -> Result<PurchasePreviewResponse, ApiError> {
        let url = format!(
            "{}/{}",
            self.purchase_url(resource),
            urlencoding::encode(session)
        );
        debug!("Snapshot fetch {}", resource);
        self.send(self.client.get(&url)).await
    }

    async fn start_payment(&self, resource: ResourceId) -> Result<PaymentIdResponse, ApiError> {
        let url = self.purchase_url(resource);
        debug!("Payment start {}", resource);
        self.send(self.client.post(&url).json(&serde_json::json!({})))
            .await
    }

    async fn payment_status(
        &self,
        resource: ResourceId,
        payment_id: &str,
    ) -> Result<PaymentStatusResponse, ApiError> {
        let url = format!(
            "{}/{}/status",
            self.purchase_url(resource),
            urlencoding::encode(payment_id)
        );
        debug!("Payment status {}: payment_id={}", resource, payment_id);
        self.send(self.client.get(&url)).await
    }
}
