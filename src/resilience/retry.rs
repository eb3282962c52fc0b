//! Bounded retry with exponential backoff and jitter.
//!
//! Transient errors (network, timeout, 429, 502/503/504) are retried up to
//! `max_attempts` times. Between attempts the wrapper sleeps
//! `base * 2^(attempt-1) * jitter` with jitter uniform in `[0.5, 1.5)`,
//! capped at `max_delay`. A 429 that carries a `Retry-After` header sleeps
//! exactly that long instead of the computed backoff.
//!
//! Everything else surfaces immediately: 401 is handled one layer further in
//! (single forced refresh in the orchestrator), other 4xx mean the request
//! itself is wrong, and a rejected circuit must not be hammered.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::GatewayResult;

/// Default number of attempts (1 initial + 3 retries).
const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default base delay for the backoff formula.
const DEFAULT_BASE: Duration = Duration::from_secs(1);

/// Default cap on a single backoff sleep.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Fixed-policy retry wrapper.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: DEFAULT_BASE,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit bounds. Attempts are clamped to at
    /// least one.
    #[must_use]
    pub fn new(max_attempts: u32, base: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max_delay,
        }
    }

    /// Executes `op` until it succeeds, fails non-retryably, or exhausts
    /// the attempt budget. `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> GatewayResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                    // Retry-After wins over the backoff formula.
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| self.backoff_delay(attempt));
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Computes the jittered backoff for a 1-based attempt number.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self.base.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64((exponential * jitter).min(self.max_delay.as_secs_f64()))
    }
}
