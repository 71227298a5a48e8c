//! Retry with exponential backoff for provider transport
//!
//! Only failures that [`UnillmError::is_retryable`] classifies as transient
//! (connection errors, 429, 5xx gateway statuses) are retried. Streaming
//! requests are retried only until the response headers arrive; once a stream
//! byte has been consumed the failure surfaces to the caller.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::UnillmError;

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Retry attempts after the initial one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Cap on the exponential growth
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Spread each delay by up to ±25%
    pub jitter: bool,
}

impl RetryConfig {
    /// No retries at all
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Tolerant profile for local servers that load models on first use
    pub fn local_server() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Delay before retry number `attempt` (zero-based)
pub fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.initial_delay.as_millis() as f64;
    let delay_ms = base_ms * config.backoff_multiplier.powi(attempt as i32);
    let delay = Duration::from_millis(delay_ms as u64).min(config.max_delay);

    if config.jitter {
        let factor = 0.75 + 0.5 * fastrand::f64();
        Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
    } else {
        delay
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded on retry attempt {}", attempt);
                }
                return Ok(value);
            }
            Err(error) if attempt < config.max_attempts && should_retry(&error) => {
                let delay = calculate_backoff_delay(attempt, config);
                attempt += 1;
                warn!(
                    "Retrying after {} ms (attempt {}/{}): {}",
                    delay.as_millis(),
                    attempt,
                    config.max_attempts,
                    error
                );
                sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

/// [`retry_with_backoff`] using the crate's retry classification
pub async fn retry_llm_operation<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
) -> Result<T, UnillmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UnillmError>>,
{
    retry_with_backoff(operation, config, UnillmError::is_retryable).await
}
