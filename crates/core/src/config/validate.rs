use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - API base URL is an http(s) URL
/// - Poll intervals are not 0
/// - Payment timeout is at least one poll interval
/// - Retry policy allows at least one attempt
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let base_url = config.api.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "api.base_url cannot be empty".to_string(),
        ));
    }
    if reqwest::Url::parse(base_url).is_err()
        || !(base_url.starts_with("http://") || base_url.starts_with("https://"))
    {
        return Err(ConfigError::ValidationError(format!(
            "api.base_url is not an http(s) URL: {}",
            base_url
        )));
    }

    if config.queue.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "queue.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.payment.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "payment.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.payment.timeout_ms < config.payment.poll_interval_ms {
        return Err(ConfigError::ValidationError(format!(
            "payment.timeout_ms ({}) must be at least payment.poll_interval_ms ({})",
            config.payment.timeout_ms, config.payment.poll_interval_ms
        )));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "retry.backoff_multiplier must be >= 1.0".to_string(),
        ));
    }

    Ok(())
}
