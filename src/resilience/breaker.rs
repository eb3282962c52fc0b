//! Three-state circuit breaker guarding the vendor API.
//!
//! Closed passes everything; `failure_threshold` consecutive failures trip
//! the circuit Open; after `open_timeout` exactly one caller is admitted as
//! a probe (the state flips to HalfOpen atomically with that admission), and
//! its outcome decides between Closed and another Open period.
//!
//! What counts as a failure is decided by
//! [`GatewayError::trips_breaker`](crate::error::GatewayError::trips_breaker):
//! 5xx plus network and timeout errors. 4xx responses, 429 included, pass
//! through untouched, and cancellation records nothing.
//!
//! All state inspection and every transition happen under one mutex; the
//! guarded future runs with the lock released.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::telemetry::{BreakerGauge, Metrics};

/// Breaker state, observable through [`CircuitBreaker::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass.
    Closed,
    /// Failing fast, calls rejected until the open timeout elapses.
    Open,
    /// Probing: calls admitted, the next outcome decides the state.
    HalfOpen,
}

impl CircuitState {
    /// Lower-case label for reports and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

/// Three-state failure isolator. One instance guards the whole vendor API.
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    inner: Mutex<BreakerInner>,
    metrics: Metrics,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// Defaults elsewhere in the system are a threshold of 5 and an open
    /// timeout of 60 seconds.
    #[must_use]
    pub fn new(failure_threshold: u32, open_timeout: Duration, metrics: Metrics) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
            }),
            metrics,
        }
    }

    /// Runs `fut` under the breaker: entry check first, then outcome
    /// recording based on the error kind.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CircuitOpen`] without polling `fut` when the
    /// circuit is open, otherwise propagates `fut`'s error.
    pub async fn guard<T, Fut>(&self, fut: Fut) -> GatewayResult<T>
    where
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.admit()?;
        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) if err.trips_breaker() => {
                self.record_failure();
                Err(err)
            }
            // Neutral outcomes: 4xx, 429, cancellation.
            Err(err) => Err(err),
        }
    }

    /// Entry check. In Open state the first caller past the timeout flips
    /// the circuit to HalfOpen and proceeds; the flip and the check share
    /// the lock, so concurrent callers cannot all slip through as probes.
    pub fn admit(&self) -> GatewayResult<()> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let since_failure = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if since_failure >= self.open_timeout {
                    inner.state = CircuitState::HalfOpen;
                    self.metrics.set_breaker_state(BreakerGauge::HalfOpen);
                    info!("circuit half-open, admitting probe request");
                    Ok(())
                } else {
                    Err(GatewayError::circuit_open(
                        self.open_timeout - since_failure,
                    ))
                }
            }
        }
    }

    /// Records a successful call (a 2xx response).
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::HalfOpen {
            info!("circuit closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        self.metrics.set_breaker_state(BreakerGauge::Closed);
    }

    /// Records a failed call (5xx, network, or timeout).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_failure_at = Some(Instant::now());
                    self.metrics.set_breaker_state(BreakerGauge::Open);
                    warn!(
                        failures = inner.consecutive_failures,
                        open_timeout_secs = self.open_timeout.as_secs(),
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_failure_at = Some(Instant::now());
                self.metrics.set_breaker_state(BreakerGauge::Open);
                warn!("probe failed, circuit re-opened");
            }
            // A late failure from a call admitted before the trip. The
            // window is anchored to the trip, not extended by stragglers.
            CircuitState::Open => {}
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner
            .lock()
            .expect("breaker lock poisoned")
            .consecutive_failures
    }
}
