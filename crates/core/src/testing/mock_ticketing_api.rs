//! Mock ticketing API for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::api::{
    ApiError, PaymentIdResponse, PaymentStatus, PaymentStatusResponse, PurchasableResponse,
    PurchasePreviewResponse, TicketingApi, WaitOrderResponse,
};
use crate::types::ResourceId;

use super::fixtures;

/// Which endpoint a recorded call hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Wait,
    Check,
    Preview,
    StartPayment,
    PaymentStatus,
}

/// A recorded API call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub resource: ResourceId,
    /// The `waitOrder` anchor sent with a queue poll.
    pub anchor: Option<u64>,
    /// Session token or payment id carried in the path.
    pub argument: Option<String>,
    /// Tokio clock time of the call, so paused-clock tests can check timing.
    pub at: tokio::time::Instant,
    pub timestamp: chrono::DateTime<Utc>,
}

type Script<T> = Arc<RwLock<VecDeque<Result<T, ApiError>>>>;

/// Mock implementation of the TicketingApi trait.
///
/// Each endpoint answers from its own script of queued responses. When a
/// script runs dry the endpoint falls back to a default:
/// - wait: still queued, 1 ahead of anchor 1
/// - check: purchasable with session `session-1`
/// - preview: [`fixtures::preview`]
/// - start payment: a fresh id `payment-N`
/// - payment status: `PENDING`
///
/// # Example
///
/// ```rust,ignore
/// let api = MockTicketingApi::new();
/// api.push_wait(Ok(fixtures::waiting(42, Some(1000)))).await;
/// api.push_wait(Ok(fixtures::admitted(Some("abc")))).await;
///
/// // ... run a flow ...
///
/// assert_eq!(api.wait_anchors().await, vec![None, Some(1000)]);
/// ```
#[derive(Debug)]
pub struct MockTicketingApi {
    wait: Script<WaitOrderResponse>,
    check: Script<PurchasableResponse>,
    preview: Script<PurchasePreviewResponse>,
    start: Script<PaymentIdResponse>,
    status: Script<PaymentStatusResponse>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Artificial latency applied to every call.
    delay: Arc<RwLock<Option<Duration>>>,
    payment_counter: AtomicUsize,
    wait_in_flight: AtomicUsize,
    max_wait_in_flight: AtomicUsize,
}

impl Default for MockTicketingApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTicketingApi {
    pub fn new() -> Self {
        Self {
            wait: Arc::default(),
            check: Arc::default(),
            preview: Arc::default(),
            start: Arc::default(),
            status: Arc::default(),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
            payment_counter: AtomicUsize::new(0),
            wait_in_flight: AtomicUsize::new(0),
            max_wait_in_flight: AtomicUsize::new(0),
        }
    }

    pub async fn push_wait(&self, response: Result<WaitOrderResponse, ApiError>) {
        self.wait.write().await.push_back(response);
    }

    pub async fn push_check(&self, response: Result<PurchasableResponse, ApiError>) {
        self.check.write().await.push_back(response);
    }

    pub async fn push_preview(&self, response: Result<PurchasePreviewResponse, ApiError>) {
        self.preview.write().await.push_back(response);
    }

    pub async fn push_start(&self, response: Result<PaymentIdResponse, ApiError>) {
        self.start.write().await.push_back(response);
    }

    pub async fn push_status(&self, response: Result<PaymentStatusResponse, ApiError>) {
        self.status.write().await.push_back(response);
    }

    /// Delay every response by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Recorded calls to one endpoint.
    pub async fn calls_to(&self, endpoint: Endpoint) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// The anchor sent with each queue poll, in call order.
    pub async fn wait_anchors(&self) -> Vec<Option<u64>> {
        self.calls_to(Endpoint::Wait)
            .await
            .into_iter()
            .map(|c| c.anchor)
            .collect()
    }

    /// Most queue polls that were ever outstanding at once.
    pub fn max_concurrent_waits(&self) -> usize {
        self.max_wait_in_flight.load(Ordering::SeqCst)
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    async fn record(
        &self,
        endpoint: Endpoint,
        resource: ResourceId,
        anchor: Option<u64>,
        argument: Option<&str>,
    ) {
        self.calls.write().await.push(RecordedCall {
            endpoint,
            resource,
            anchor,
            argument: argument.map(str::to_string),
            at: tokio::time::Instant::now(),
            timestamp: Utc::now(),
        });
    }

    async fn latency(&self) {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn next<T>(&self, script: &Script<T>) -> Option<Result<T, ApiError>> {
        script.write().await.pop_front()
    }
}

#[async_trait]
impl TicketingApi for MockTicketingApi {
    async fn wait_order(
        &self,
        resource: ResourceId,
        anchor: Option<u64>,
    ) -> Result<WaitOrderResponse, ApiError> {
        self.record(Endpoint::Wait, resource, anchor, None).await;

        let now = self.wait_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_wait_in_flight.fetch_max(now, Ordering::SeqCst);
        self.latency().await;
        self.wait_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next(&self.wait)
            .await
            .unwrap_or_else(|| Ok(fixtures::waiting(1, Some(anchor.unwrap_or(1)))))
    }

    async fn check_purchasable(
        &self,
        resource: ResourceId,
    ) -> Result<PurchasableResponse, ApiError> {
        self.record(Endpoint::Check, resource, None, None).await;
        self.latency().await;
        self.next(&self.check)
            .await
            .unwrap_or_else(|| Ok(fixtures::purchasable("session-1")))
    }

    async fn purchase_preview(
        &self,
        resource: ResourceId,
        session: &str,
    ) -> Result<PurchasePreviewResponse, ApiError> {
        self.record(Endpoint::Preview, resource, None, Some(session))
            .await;
        self.latency().await;
        self.next(&self.preview)
            .await
            .unwrap_or_else(|| Ok(fixtures::preview()))
    }

    async fn start_payment(&self, resource: ResourceId) -> Result<PaymentIdResponse, ApiError> {
        self.record(Endpoint::StartPayment, resource, None, None)
            .await;
        self.latency().await;
        match self.next(&self.start).await {
            Some(response) => response,
            None => {
                let n = self.payment_counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(PaymentIdResponse {
                    payment_id: format!("payment-{}", n),
                })
            }
        }
    }

    async fn payment_status(
        &self,
        resource: ResourceId,
        payment_id: &str,
    ) -> Result<PaymentStatusResponse, ApiError> {
        self.record(Endpoint::PaymentStatus, resource, None, Some(payment_id))
            .await;
        self.latency().await;
        self.next(&self.status)
            .await
            .unwrap_or_else(|| Ok(fixtures::status(PaymentStatus::Pending)))
    }
}
