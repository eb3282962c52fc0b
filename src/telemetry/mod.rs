//! Observability shim and process-wide metrics.
//!
//! Tool invocations are wrapped in a span pair: [`Telemetry::start_span`]
//! when the dispatcher accepts a call, [`ToolSpan::finish`] when the handler
//! returns. When observability is disabled both are no-ops apart from
//! generating a correlation id, so the call path never branches on it.
//!
//! Observability is enabled when `CENTRA_TRACE=1` or an
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is present in the environment.
//!
//! Metrics are plain atomics plus one small map, snapshotted by the health
//! probe and by tests. There is no exporter dependency; operators scrape the
//! structured logs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info_span, Span};
use uuid::Uuid;

/// Argument keys whose values are redacted in span attributes. Matched as
/// substrings, case-insensitive.
const SECRET_KEY_MARKERS: [&str; 4] = ["secret", "password", "token", "key"];

/// HTTP status class, the granularity at which API calls are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 2xx responses.
    Success,
    /// 4xx responses (including 429).
    ClientError,
    /// 5xx responses.
    ServerError,
    /// Transport-level failures (no status line).
    Transport,
}

impl StatusClass {
    /// Classifies an HTTP status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            400..=499 => Self::ClientError,
            _ => Self::ServerError,
        }
    }

    /// Short label used in metric keys and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "2xx",
            Self::ClientError => "4xx",
            Self::ServerError => "5xx",
            Self::Transport => "transport",
        }
    }
}

/// Circuit breaker state as exported to metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerGauge {
    Closed,
    Open,
    HalfOpen,
}

struct MetricsInner {
    api_calls: Mutex<HashMap<(String, StatusClass), u64>>,
    call_count: AtomicU64,
    call_duration_ms_total: AtomicU64,
    token_refreshes: AtomicU64,
    breaker_state: AtomicU64,
    limiter_tokens: AtomicU64,
}

/// Process-wide metrics handle. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Metrics({:?})", self.snapshot())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates an empty metrics registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                api_calls: Mutex::new(HashMap::new()),
                call_count: AtomicU64::new(0),
                call_duration_ms_total: AtomicU64::new(0),
                token_refreshes: AtomicU64::new(0),
                breaker_state: AtomicU64::new(0),
                limiter_tokens: AtomicU64::new(0),
            }),
        }
    }

    /// Records one completed API call against an endpoint.
    pub fn record_api_call(&self, endpoint: &str, class: StatusClass, duration: Duration) {
        let mut calls = self.inner.api_calls.lock().expect("metrics lock poisoned");
        *calls.entry((endpoint.to_string(), class)).or_insert(0) += 1;
        drop(calls);
        self.inner.call_count.fetch_add(1, Ordering::Relaxed);
        self.inner
            .call_duration_ms_total
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Records one OAuth2 exchange.
    pub fn record_token_refresh(&self) {
        self.inner.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Updates the breaker state gauge.
    pub fn set_breaker_state(&self, state: BreakerGauge) {
        let value = match state {
            BreakerGauge::Closed => 0,
            BreakerGauge::Open => 1,
            BreakerGauge::HalfOpen => 2,
        };
        self.inner.breaker_state.store(value, Ordering::Relaxed);
    }

    /// Updates the rate limiter tokens-available gauge.
    pub fn set_limiter_tokens(&self, tokens: u64) {
        self.inner.limiter_tokens.store(tokens, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let api_calls = self
            .inner
            .api_calls
            .lock()
            .expect("metrics lock poisoned")
            .iter()
            .map(|((endpoint, class), count)| (endpoint.clone(), *class, *count))
            .collect();
        MetricsSnapshot {
            api_calls,
            call_count: self.inner.call_count.load(Ordering::Relaxed),
            call_duration_ms_total: self.inner.call_duration_ms_total.load(Ordering::Relaxed),
            token_refreshes: self.inner.token_refreshes.load(Ordering::Relaxed),
            breaker_state: self.inner.breaker_state.load(Ordering::Relaxed),
            limiter_tokens: self.inner.limiter_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the metrics registry.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// (endpoint, status class, count) triples.
    pub api_calls: Vec<(String, StatusClass, u64)>,
    /// Total completed API calls.
    pub call_count: u64,
    /// Sum of API call durations in milliseconds.
    pub call_duration_ms_total: u64,
    /// OAuth2 exchanges since startup.
    pub token_refreshes: u64,
    /// Breaker gauge: 0 closed, 1 open, 2 half-open.
    pub breaker_state: u64,
    /// Rate limiter tokens available at last update.
    pub limiter_tokens: u64,
}

impl MetricsSnapshot {
    /// Total calls recorded against `endpoint` across all status classes.
    #[must_use]
    pub fn calls_to(&self, endpoint: &str) -> u64 {
        self.api_calls
            .iter()
            .filter(|(e, _, _)| e == endpoint)
            .map(|(_, _, count)| count)
            .sum()
    }
}

/// Span emission for tool invocations. No-op when disabled.
#[derive(Debug, Clone)]
pub struct Telemetry {
    enabled: bool,
}

impl Telemetry {
    /// Enables span emission when the environment opts in
    /// (`CENTRA_TRACE=1` or `OTEL_EXPORTER_OTLP_ENDPOINT` set).
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var("CENTRA_TRACE").is_ok_and(|v| v == "1")
            || std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok_and(|v| !v.is_empty());
        Self { enabled }
    }

    /// A shim that never emits spans. Correlation ids are still generated.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Returns whether span emission is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Opens a span for one tool invocation.
    ///
    /// Argument values whose key looks secret-bearing are redacted before
    /// they reach the span attributes.
    #[must_use]
    pub fn start_span(&self, tool: &str, args: &serde_json::Map<String, Value>) -> ToolSpan {
        let correlation_id = Uuid::new_v4().to_string();
        let span = if self.enabled {
            let span = info_span!(
                "tool_call",
                tool = %tool,
                args = %redacted_args(args),
                correlation_id = %correlation_id,
            );
            Some(span)
        } else {
            None
        };
        ToolSpan {
            tool: tool.to_string(),
            correlation_id,
            span,
            started: Instant::now(),
        }
    }
}

/// An open tool-invocation span. Closed by [`finish`](Self::finish).
#[derive(Debug)]
pub struct ToolSpan {
    tool: String,
    correlation_id: String,
    span: Option<Span>,
    started: Instant,
}

impl ToolSpan {
    /// The id operators use to join report failures with log lines.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Closes the span, recording duration and outcome.
    pub fn finish(self, success: bool, error_kind: Option<&str>) {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        if let Some(span) = self.span {
            let _entered = span.enter();
            tracing::info!(
                tool = %self.tool,
                correlation_id = %self.correlation_id,
                duration_ms,
                success,
                error_kind = error_kind.unwrap_or(""),
                "tool call finished"
            );
        } else if !success {
            tracing::debug!(
                tool = %self.tool,
                correlation_id = %self.correlation_id,
                duration_ms,
                error_kind = error_kind.unwrap_or(""),
                "tool call failed"
            );
        }
    }
}

/// Renders the argument map with secret-looking values replaced.
fn redacted_args(args: &serde_json::Map<String, Value>) -> String {
    let mut redacted = serde_json::Map::new();
    for (key, value) in args {
        let lower = key.to_lowercase();
        if SECRET_KEY_MARKERS.iter().any(|m| lower.contains(m)) {
            redacted.insert(key.clone(), Value::String("[REDACTED]".to_string()));
        } else {
            redacted.insert(key.clone(), value.clone());
        }
    }
    Value::Object(redacted).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_class_mapping() {
        assert_eq!(StatusClass::from_status(200), StatusClass::Success);
        assert_eq!(StatusClass::from_status(204), StatusClass::Success);
        assert_eq!(StatusClass::from_status(404), StatusClass::ClientError);
        assert_eq!(StatusClass::from_status(429), StatusClass::ClientError);
        assert_eq!(StatusClass::from_status(500), StatusClass::ServerError);
        assert_eq!(StatusClass::from_status(503), StatusClass::ServerError);
    }

    #[test]
    fn test_api_call_accounting() {
        let metrics = Metrics::new();
        metrics.record_api_call(
            "/monitoring/v1/aps",
            StatusClass::Success,
            Duration::from_millis(120),
        );
        metrics.record_api_call(
            "/monitoring/v1/aps",
            StatusClass::Success,
            Duration::from_millis(80),
        );
        metrics.record_api_call(
            "/monitoring/v1/aps",
            StatusClass::ServerError,
            Duration::from_millis(10),
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.call_count, 3);
        assert_eq!(snapshot.calls_to("/monitoring/v1/aps"), 3);
        assert_eq!(snapshot.call_duration_ms_total, 210);
        assert_eq!(snapshot.calls_to("/other"), 0);
    }

    #[test]
    fn test_redaction_by_key_marker() {
        let args = json!({
            "device_serial": "CN12345",
            "client_secret": "hunter2",
            "api_token": "abc",
            "limit": 10,
        });
        let rendered = redacted_args(args.as_object().unwrap());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("abc\""));
        assert!(rendered.contains("CN12345"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_disabled_span_still_has_correlation_id() {
        let telemetry = Telemetry::disabled();
        let span = telemetry.start_span("get_device_list", &serde_json::Map::new());
        assert!(!span.correlation_id().is_empty());
        span.finish(true, None);
    }

    #[test]
    fn test_gauges() {
        let metrics = Metrics::new();
        metrics.set_breaker_state(BreakerGauge::Open);
        metrics.set_limiter_tokens(42);
        metrics.record_token_refresh();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.breaker_state, 1);
        assert_eq!(snapshot.limiter_tokens, 42);
        assert_eq!(snapshot.token_refreshes, 1);
    }
}
