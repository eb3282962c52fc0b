//! Token-bucket rate limiter for outbound API requests.
//!
//! The bucket starts full. Each [`acquire`](RateLimiter::acquire) consumes
//! one token; tokens refill continuously, proportional to elapsed time, up
//! to the bucket capacity. A caller that finds the bucket empty sleeps for
//! the minimum interval until one more token accrues and tries again.
//!
//! All bucket accounting happens under one mutex with no suspension points
//! inside; waiting happens with the lock released. `acquire` is
//! cancel-safe: a waiter whose future is dropped has consumed nothing.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::telemetry::Metrics;

/// Bucket state. `last_refill` advances by the time-equivalent of the
/// tokens credited, so fractional refill progress is never lost.
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token-bucket gate on outbound requests.
///
/// Defaults are 100 requests per 60 second window, matching the vendor's
/// published per-client allowance.
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    bucket: Mutex<Bucket>,
    metrics: Metrics,
}

impl RateLimiter {
    /// Creates a full bucket with the given capacity and refill window.
    ///
    /// A zero capacity or window is clamped to one; a gate that can never
    /// open is a configuration mistake, not a valid limiter.
    #[must_use]
    pub fn new(capacity: u32, window: Duration, metrics: Metrics) -> Self {
        let capacity = capacity.max(1);
        let window = window.max(Duration::from_millis(1));
        metrics.set_limiter_tokens(u64::from(capacity));
        Self {
            capacity,
            window,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            metrics,
        }
    }

    /// Waits until a token is available, then consumes it.
    ///
    /// Cancel-safe: dropping the returned future while it waits consumes no
    /// token. (Cancellation of the enclosing tool call is exactly this
    /// drop.)
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");
                self.refill(&mut bucket);
                if bucket.tokens >= 1 {
                    bucket.tokens -= 1;
                    self.metrics.set_limiter_tokens(u64::from(bucket.tokens));
                    return;
                }
                // Sleep just long enough for one token to accrue.
                self.time_per_token()
                    .saturating_sub(bucket.last_refill.elapsed())
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Tokens currently available (after refill accounting).
    #[must_use]
    pub fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");
        self.refill(&mut bucket);
        bucket.tokens
    }

    /// Fraction of the bucket currently in use, in `[0.0, 1.0]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        let available = f64::from(self.available());
        1.0 - available / f64::from(self.capacity)
    }

    /// Bucket capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Credits tokens for the time elapsed since the last refill.
    ///
    /// `last_refill` advances by the exact time-equivalent of the credited
    /// tokens (or resets to now when the bucket fills), so the fractional
    /// remainder keeps accruing toward the next token.
    fn refill(&self, bucket: &mut Bucket) {
        let elapsed = bucket.last_refill.elapsed();
        let refilled = (elapsed.as_nanos() * u128::from(self.capacity)
            / self.window.as_nanos()) as u64;
        if refilled == 0 {
            return;
        }

        let headroom = u64::from(self.capacity - bucket.tokens);
        if refilled >= headroom {
            bucket.tokens = self.capacity;
            bucket.last_refill = Instant::now();
        } else {
            bucket.tokens += refilled as u32;
            let credited =
                Duration::from_nanos((self.window.as_nanos() * u128::from(refilled)
                    / u128::from(self.capacity)) as u64);
            bucket.last_refill += credited;
        }
    }

    /// Time for one token to accrue.
    fn time_per_token(&self) -> Duration {
        self.window / self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(capacity, window, Metrics::new())
    }

    #[tokio::test]
    async fn test_burst_up_to_capacity_is_immediate() {
        let limiter = limiter(10, Duration::from_secs(60));
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_waits_for_refill() {
        let limiter = limiter(2, Duration::from_secs(2));
        limiter.acquire().await;
        limiter.acquire().await;

        let before = Instant::now();
        limiter.acquire().await;
        // One token accrues per second (capacity 2 / window 2 s).
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(900), "waited {waited:?}");
        assert!(waited <= Duration::from_millis(1200), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_capacity() {
        let limiter = limiter(5, Duration::from_secs(5));
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.available(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_refill_progress_is_kept() {
        let limiter = limiter(2, Duration::from_secs(2));
        limiter.acquire().await;
        limiter.acquire().await;

        // 1.5 s at 1 token/s credits one token and keeps the half token
        // of progress, so the next token lands at 2.0 s, not 2.5 s.
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(limiter.available(), 1);

        limiter.acquire().await;
        let before = Instant::now();
        limiter.acquire().await;
        assert!(before.elapsed() <= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_consumes_nothing() {
        let limiter = std::sync::Arc::new(limiter(1, Duration::from_secs(10)));
        limiter.acquire().await;

        let waiter = {
            let limiter = std::sync::Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire().await })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        // The aborted waiter must not have taken the token that accrues.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_utilization() {
        let limiter = limiter(4, Duration::from_secs(60));
        assert!(limiter.utilization() < 0.01);
        limiter.acquire().await;
        limiter.acquire().await;
        let used = limiter.utilization();
        assert!((used - 0.5).abs() < 0.01, "utilization {used}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_throughput_bounded_by_capacity_plus_refill() {
        // Over a window of duration W, completed acquires on one bucket are
        // at most capacity + floor(W * capacity / window).
        let limiter = std::sync::Arc::new(limiter(10, Duration::from_secs(10)));
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));

        let worker = {
            let limiter = std::sync::Arc::clone(&limiter);
            let counter = std::sync::Arc::clone(&counter);
            tokio::spawn(async move {
                loop {
                    limiter.acquire().await;
                    counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
            })
        };

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        worker.abort();

        let completed = counter.load(std::sync::atomic::Ordering::Relaxed);
        assert!(completed <= 10 + 10, "completed {completed}");
    }
}
