//! Bounded retry with a fixed delay.
//!
//! Wraps calls to external capabilities. Attempts run strictly one after
//! another; there is no backoff growth and no jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::models::RelevanceConfig;

/// Retry policy: up to `max_attempts` tries, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn from_config(config: &RelevanceConfig) -> Self {
        Self::new(config.max_retries, Duration::from_secs(config.retry_delay_secs))
    }

    /// Run `op` until it succeeds or attempts run out; returns the last
    /// error in the latter case. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    log::warn!("{}: attempt {}/{} failed: {}", label, attempt, attempts, e);
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("{}: giving up after {} attempts: {}", label, attempts, e);
                    return Err(e);
                }
            }
        }
    }
}
