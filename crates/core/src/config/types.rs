use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub error_codes: ErrorCodes,
}

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL including the API prefix (e.g. "https://host/api/v1").
    pub base_url: String,
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u32,
    /// Session cookie sent with every request, e.g. "JSESSIONID=...".
    #[serde(default)]
    pub session_cookie: Option<String>,
}

fn default_request_timeout() -> u32 {
    10
}

/// Admission queue polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Payment attempt polling and timeout ceiling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    /// How often the attempt status is polled (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Elapsed time after which a still-pending attempt times out.
    #[serde(default = "default_payment_timeout")]
    pub timeout_ms: u64,

    /// Delay between a successful payment and leaving the flow.
    #[serde(default = "default_success_redirect_delay")]
    pub success_redirect_delay_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_ms: default_payment_timeout(),
            success_redirect_delay_ms: default_success_redirect_delay(),
        }
    }
}

impl PaymentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn success_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.success_redirect_delay_ms)
    }
}

fn default_poll_interval() -> u64 {
    3000 // 3 seconds
}

fn default_payment_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_success_redirect_delay() -> u64 {
    3000
}

/// Retry configuration shared by every network call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum attempts (one-shot calls) or consecutive failures (polling loops).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Backend domain error codes the client reacts to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorCodes {
    #[serde(default = "default_unauthenticated")]
    pub unauthenticated: String,
    #[serde(default = "default_already_purchased")]
    pub already_purchased: String,
    #[serde(default = "default_outside_sale_window")]
    pub outside_sale_window: String,
    /// Assumed default (`WT-0002`); the backend does not publish this code,
    /// so override it under `[error_codes]` to match the deployment.
    #[serde(default = "default_sold_out")]
    pub sold_out: String,
    /// Assumed default (`TK-0006`); override under `[error_codes]` like
    /// `sold_out`.
    #[serde(default = "default_already_reserved")]
    pub already_reserved: String,
    #[serde(default = "default_payment_not_found")]
    pub payment_not_found: String,
}

impl Default for ErrorCodes {
    fn default() -> Self {
        Self {
            unauthenticated: default_unauthenticated(),
            already_purchased: default_already_purchased(),
            outside_sale_window: default_outside_sale_window(),
            sold_out: default_sold_out(),
            already_reserved: default_already_reserved(),
            payment_not_found: default_payment_not_found(),
        }
    }
}

fn default_unauthenticated() -> String {
    "AU-0002".to_string()
}

fn default_already_purchased() -> String {
    "TK-0002".to_string()
}

fn default_outside_sale_window() -> String {
    "TK-0001".to_string()
}

fn default_sold_out() -> String {
    "WT-0002".to_string()
}

fn default_already_reserved() -> String {
    "TK-0006".to_string()
}

fn default_payment_not_found() -> String {
    "P-0001".to_string()
}

/// Sanitized config for logging (session cookie redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub api: SanitizedApiConfig,
    pub queue: QueueConfig,
    pub payment: PaymentConfig,
    pub retry: RetryConfig,
    pub error_codes: ErrorCodes,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedApiConfig {
    pub base_url: String,
    pub timeout_secs: u32,
    pub session_cookie_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            api: SanitizedApiConfig {
                base_url: config.api.base_url.clone(),
                timeout_secs: config.api.timeout_secs,
                session_cookie_configured: config
                    .api
                    .session_cookie
                    .as_ref()
                    .is_some_and(|c| !c.is_empty()),
            },
            queue: config.queue.clone(),
            payment: config.payment.clone(),
            retry: config.retry.clone(),
            error_codes: config.error_codes.clone(),
        }
    }
}
