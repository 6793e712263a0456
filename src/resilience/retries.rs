//! Bounded retry loop for source fetches.
//!
//! # Responsibilities
//! - Decide whether a failure is transient (via `Retryable`)
//! - Sleep with jittered exponential backoff between attempts
//! - Give up after `max_attempts` total attempts

use std::future::Future;

use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Hard ceiling on attempts per fetch, whatever the configuration says.
pub const MAX_ATTEMPTS: u32 = 4;

/// Errors that can tell whether another attempt may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        if !config.enabled {
            return Self::none();
        }
        Self::new(config.max_attempts, config.base_delay_ms, config.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, 400, 5_000)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, source: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::warn!(
                    source,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient source failure, retrying"
                );
                metrics::record_source_retry(source);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
