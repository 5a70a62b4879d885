//! The one call site every embedding and completion request goes through.
//!
//! Each attempt runs under a timeout. Transient failures are retried with
//! exponential backoff; anything else is returned immediately.

use crate::error::RemoteServiceError;
use glovedbot_config::RetryConfig;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

/// Retry, backoff and timeout settings for remote calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            self.max_delay
        }
    }
}

/// Server-suggested wait, e.g. `Retry-After: 5` inside a provider message.
fn retry_after(err: &RemoteServiceError) -> Option<Duration> {
    let RemoteServiceError::RateLimited(message) = err else {
        return None;
    };
    let lower = message.to_lowercase();
    let pos = lower.find("retry-after")?;
    lower[pos..]
        .split_whitespace()
        .skip(1)
        .find_map(|word| {
            word.trim_end_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .ok()
        })
        .map(Duration::from_secs)
}

/// Run `call` under `policy`, retrying transient failures.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, RemoteServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteServiceError>>,
{
    let mut attempt = 0u32;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RemoteServiceError::Timeout {
                operation: operation.to_string(),
                timeout_ms: policy.timeout.as_millis() as u64,
            }),
        };
        let err = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{operation} succeeded after retry (attempt={})", attempt + 1);
                }
                return Ok(value);
            }
            Err(err) => err,
        };
        if attempt >= policy.max_retries || !err.is_transient() {
            return Err(err);
        }
        let delay = retry_after(&err)
            .map(|delay| delay.min(policy.max_delay))
            .unwrap_or_else(|| policy.delay_for(attempt));
        warn!(
            "retrying {operation} (attempt={}, max_retries={}, delay_ms={}, error={})",
            attempt + 1,
            policy.max_retries,
            delay.as_millis(),
            err
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
