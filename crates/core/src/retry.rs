//! Retry policy applied uniformly to every network call.
//!
//! One-shot calls (reservation check, snapshot fetch, payment start) go
//! through [`RetryPolicy::run`]. Polling loops retry on their own schedule and
//! use a [`RetryBudget`] to bound consecutive failures with the same limit.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::RetryConfig;
use crate::metrics;
use crate::scheduler::{sleep_or_cancel, CancelToken};

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a recoverable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// An attempt failed with an error that must not be retried.
    #[error("{0}")]
    Fatal(E),

    /// The surrounding flow was cancelled while retrying.
    #[error("cancelled")]
    Cancelled,
}

/// Exponential backoff retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let delay = self.initial_backoff.mul_f64(factor);
        delay.min(self.max_backoff)
    }

    /// A fresh consecutive-failure budget with this policy's limit.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_attempts)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `is_recoverable` decides which errors are worth another attempt.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        phase: &'static str,
        cancel: &CancelToken,
        mut op: F,
        is_recoverable: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !is_recoverable(&error) {
                return Err(RetryError::Fatal(error));
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.backoff(attempt);
            warn!(
                "{} attempt {}/{} failed: {}; retrying in {:?}",
                phase, attempt, self.max_attempts, error, delay
            );
            metrics::RETRY_ATTEMPTS.with_label_values(&[phase]).inc();

            if !sleep_or_cancel(cancel, delay).await {
                return Err(RetryError::Cancelled);
            }
        }
    }
}

/// Counts consecutive failures of a polling loop.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    limit: u32,
    consecutive_failures: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            consecutive_failures: 0,
        }
    }

    /// Record a failure. Returns `true` once the budget is exhausted.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures > self.limit
    }

    /// A success restores the full budget.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
