//! Retry with exponential backoff on rate-limit failures.
//!
//! Every outbound call to an external API goes through [`retry_async`], so
//! all collaborators share one backoff policy. Only errors that report
//! themselves as rate limited are retried; anything else surfaces on the
//! first failure.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ClientError;
use crate::metrics;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay; attempt `n` (from 0) waits `base * 2^n`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(15);

/// Errors that can signal a rate limit.
pub trait Retryable {
    fn is_rate_limited(&self) -> bool;
}

impl Retryable for ClientError {
    fn is_rate_limited(&self) -> bool {
        ClientError::is_rate_limited(self)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the initial one.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Same policy under another operation name.
    pub fn named(&self, operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..self.clone()
        }
    }

    /// Delay before retrying after failed attempt `attempt` (counted from 0).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Execute an async operation, retrying rate-limited failures.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new("classify_frame");
/// let response = retry_async(&config, || async { client.send(&request).await }).await?;
/// ```
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        operation = %config.operation_name,
                        attempts = attempt + 1,
                        "Succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_rate_limited() && attempt + 1 < config.max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = %config.operation_name,
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs_f64(),
                    "Rate limited, retrying in {:?}: {}",
                    delay,
                    e
                );
                metrics::record_retry(&config.operation_name);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
