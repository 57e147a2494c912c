//! Exponential backoff with jitter for transient LLM-call failures.
//!
//! A plain loop with backoff sleeps, no generator/coroutine machinery.
//! Made public so callers can reuse the policy for their own retryable
//! operations.

use std::time::Duration;

use rand::Rng;

use crate::error::Error;
use crate::metrics::Metrics;

/// Retry policy: exponential backoff, optionally jittered, with a cap on
/// both the wait and the attempt count.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub num_retries: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            num_retries: 5,
            min_wait: Duration::from_secs(8),
            max_wait: Duration::from_secs(64),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff duration for the given zero-indexed attempt, with up to ±20%
    /// jitter so concurrent conversations don't retry in lockstep.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.min_wait.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_wait.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_secs_f64(capped * jitter)
    }
}

/// Whether `err` is shaped like a rate-limit rejection (HTTP 429, or an
/// `Api` error whose message names a rate limit).
fn is_rate_limited(err: &Error) -> bool {
    match err {
        Error::Http(e) => e.status().is_some_and(|s| s.as_u16() == 429),
        Error::Api(msg) => msg.to_lowercase().contains("rate limit"),
        _ => false,
    }
}

/// Run `op` with exponential backoff, retrying only on
/// [`Error::is_retryable`] failures, up to `policy.num_retries` times.
///
/// `op` receives the zero-indexed attempt number and whether the *previous*
/// attempt failed with a rate-limit-shaped error, so callers can nudge a
/// zero temperature up on the next try (some providers deterministically
/// re-emit empty responses when repeatedly queried at `temperature == 0.0`).
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    metrics: &mut Metrics,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut(u32, bool) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let mut attempt = 0u32;
    let mut rate_limited_last = false;
    loop {
        match op(attempt, rate_limited_last).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.num_retries => {
                metrics.add_retry();
                rate_limited_last = is_rate_limited(&err);
                let wait = policy.backoff_for(attempt);
                log::warn!("llm call failed (attempt {}/{}): {err}; retrying in {wait:?}", attempt + 1, policy.num_retries);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
