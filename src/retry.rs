//! Retry logic with exponential backoff for network operations.
//!
//! Only transient failures (network and timeout errors) are retried;
//! anything else is returned to the caller on the first attempt.

use crate::errors::SpeedTestError;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default number of retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (in milliseconds).
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Maximum delay cap for exponential backoff (in milliseconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self { max_retries, base_delay_ms, max_delay_ms }
    }

    /// A configuration that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Delay before retry number `attempt` (0-based):
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Execute an async operation, retrying transient failures with
/// exponential backoff.
///
/// Returns the first success, the first non-transient error, or the last
/// error once all attempts are exhausted.
pub async fn retry_async<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, SpeedTestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SpeedTestError>>,
{
    let total_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}",
                        operation_name,
                        attempt + 1
                    );
                }
                return Ok(result);
            }
            Err(e) if !e.is_retryable() => {
                debug!("{}: Not retrying: {}", operation_name, e.message);
                return Err(e);
            }
            Err(e) if attempt + 1 >= total_attempts => {
                warn!(
                    "{}: All {} attempts failed. Last error: {}",
                    operation_name, total_attempts, e.message
                );
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{}: Attempt {} failed: {}; retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    e.message,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
