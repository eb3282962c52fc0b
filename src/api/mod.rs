//! HTTP call orchestrator for the Aruba Central API.
//!
//! [`ApiClient::call`] is the only HTTP surface tool handlers use. Each call
//! runs through a fixed four-layer composition, outermost first:
//!
//! 1. Token freshness ([`TokenManager::ensure_fresh`])
//! 2. Rate limiter ([`RateLimiter::acquire`])
//! 3. Circuit breaker ([`CircuitBreaker::guard`])
//! 4. Retry wrapper ([`RetryPolicy::run`]) around the actual request
//!
//! 401 handling is orthogonal to the retry wrapper: the first 401 a call
//! sees triggers one forced token refresh and one re-issue of the request.
//! A second 401 surfaces as an authentication error; this single-shot rule
//! keeps invalid credentials from looping forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::resilience::{CircuitBreaker, RateLimiter, RetryPolicy};
use crate::telemetry::{Metrics, StatusClass};

/// Timeout for the health probe's reachability GET.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap endpoint used to confirm vendor reachability.
const PROBE_ENDPOINT: &str = "/monitoring/v2/aps";

/// Query parameter list. `None` values are omitted from the request.
pub type Params<'a> = &'a [(&'a str, Option<String>)];

/// The one outbound HTTP surface. Cheap to clone; clones share the token
/// manager, limiter, breaker, and metrics.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl ApiClient {
    /// Builds the client and its HTTP transport from the runtime
    /// configuration and the shared subsystems.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the TLS transport cannot be
    /// constructed.
    pub fn new(
        config: &Config,
        tokens: Arc<TokenManager>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        metrics: Metrics,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.api_timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            tokens,
            limiter,
            breaker,
            retry: RetryPolicy::default(),
            metrics,
        })
    }

    /// Overrides the retry policy. Used by tests that need tight budgets.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// GET convenience over [`call`](Self::call).
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn get(&self, endpoint: &str, params: Params<'_>) -> GatewayResult<Value> {
        self.call(Method::GET, endpoint, params, None).await
    }

    /// POST convenience over [`call`](Self::call).
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn post(
        &self,
        endpoint: &str,
        params: Params<'_>,
        body: Value,
    ) -> GatewayResult<Value> {
        self.call(Method::POST, endpoint, params, Some(body)).await
    }

    /// Performs one resilient API call and decodes the JSON response.
    ///
    /// Empty 2xx bodies decode to `{}`. The orchestrator adds no pagination
    /// handling; callers pass `limit`/`offset` as ordinary parameters.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::CircuitOpen`] when the breaker rejects the call
    /// - [`GatewayError::Auth`] on 401 after the single forced refresh
    /// - [`GatewayError::UpstreamClient`] for other 4xx
    /// - [`GatewayError::UpstreamServer`] for 5xx surviving retries
    /// - [`GatewayError::Timeout`] / [`GatewayError::Network`] for transport
    ///   failures surviving retries
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        params: Params<'_>,
        body: Option<Value>,
    ) -> GatewayResult<Value> {
        let token = self.tokens.ensure_fresh().await?;
        self.limiter.acquire().await;

        // Per-call state for the single-shot 401 re-auth. The holder tracks
        // the token the next attempt will send, which force_refresh compares
        // against to collapse concurrent refreshes.
        let reauthed = AtomicBool::new(false);
        let current_token = Mutex::new(token);

        let started = Instant::now();
        let result = self
            .breaker
            .guard(self.retry.run(|attempt| {
                let method = method.clone();
                let body = body.clone();
                let reauthed = &reauthed;
                let current_token = &current_token;
                async move {
                    let token = current_token
                        .lock()
                        .expect("token holder lock poisoned")
                        .clone();
                    debug!(%method, endpoint, attempt, "issuing API request");
                    let response = self
                        .send_once(method.clone(), endpoint, params, body.clone(), &token)
                        .await?;

                    if response.status() == StatusCode::UNAUTHORIZED
                        && !reauthed.swap(true, Ordering::SeqCst)
                    {
                        warn!(endpoint, "401 received, forcing token refresh");
                        let fresh = self.tokens.force_refresh(&token).await?;
                        *current_token
                            .lock()
                            .expect("token holder lock poisoned") = fresh.clone();
                        let response = self
                            .send_once(method, endpoint, params, body, &fresh)
                            .await?;
                        return Self::decode(response).await;
                    }

                    Self::decode(response).await
                }
            }))
            .await;

        self.record(endpoint, started.elapsed(), &result);
        result
    }

    /// One lightweight reachability GET for the health probe. Deliberately
    /// bypasses the limiter, breaker, and retry stack: the probe must not
    /// consume request budget or disturb failure accounting.
    ///
    /// # Errors
    ///
    /// Propagates auth and transport errors; any HTTP status is `Ok`.
    pub async fn probe_reachability(&self) -> GatewayResult<u16> {
        let token = self.tokens.ensure_fresh().await?;
        let url = format!("{}{}", self.base_url, PROBE_ENDPOINT);
        let response = self
            .http
            .get(url)
            .query(&[("limit", "1")])
            .bearer_auth(token.expose_secret())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// Token manager handle, for the health probe.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Circuit breaker handle, for the health probe.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Rate limiter handle, for the health probe.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Metrics handle.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Sends one HTTP request. Only transport-level failures error here;
    /// status handling happens in [`decode`](Self::decode).
    async fn send_once(
        &self,
        method: Method,
        endpoint: &str,
        params: Params<'_>,
        body: Option<Value>,
        token: &SecretString,
    ) -> GatewayResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
            .collect();

        let mut request = self
            .http
            .request(method, url)
            .query(&query)
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request.send().await?)
    }

    /// Maps the response status to the error taxonomy and decodes the body.
    async fn decode(response: reqwest::Response) -> GatewayResult<Value> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            return serde_json::from_slice(&bytes).map_err(|e| {
                GatewayError::invalid_response(format!("undecodable body: {e}"))
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::auth("unauthorized after token refresh"));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(GatewayError::rate_limited(retry_after));
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let summary = truncate_reason(&body);
        if status.is_client_error() {
            Err(GatewayError::upstream_client(code, summary))
        } else {
            Err(GatewayError::upstream_server(code, summary))
        }
    }

    /// Records the call against the metrics registry. Circuit rejections
    /// performed no I/O and are not counted as API calls.
    fn record(&self, endpoint: &str, duration: Duration, result: &GatewayResult<Value>) {
        let class = match result {
            Ok(_) => StatusClass::Success,
            Err(GatewayError::CircuitOpen { .. }) => return,
            Err(GatewayError::UpstreamClient { .. })
            | Err(GatewayError::RateLimited { .. })
            | Err(GatewayError::Auth { .. }) => StatusClass::ClientError,
            Err(GatewayError::UpstreamServer { .. }) => StatusClass::ServerError,
            Err(_) => StatusClass::Transport,
        };
        self.metrics.record_api_call(endpoint, class, duration);
    }
}

/// Keeps error bodies short enough for logs and reports.
fn truncate_reason(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut cut = MAX;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &trimmed[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secrets::SecretSources;
    use wiremock::matchers::{header, method as http_method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aruba_client_id"), "test-client").unwrap();
        std::fs::write(dir.path().join("aruba_client_secret"), "test-secret").unwrap();
        std::fs::write(dir.path().join("aruba_base_url"), server.uri()).unwrap();
        let sources = SecretSources::with_dirs(vec![dir.path().to_path_buf()]);
        let config = Config::load_from(&sources).unwrap();

        let metrics = Metrics::new();
        let tokens = Arc::new(TokenManager::new(
            &config,
            reqwest::Client::new(),
            metrics.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window,
            metrics.clone(),
        ));
        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker_threshold,
            config.breaker_timeout,
            metrics.clone(),
        ));
        ApiClient::new(&config, tokens, limiter, breaker, metrics).unwrap()
    }

    fn token_mock() -> Mock {
        Mock::given(http_method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-fresh",
                "expires_in": 7200,
            })))
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_params() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        Mock::given(http_method("GET"))
            .and(path("/inventory/v1/devices"))
            .and(query_param("limit", "10"))
            .and(header("authorization", "Bearer tok-fresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 1})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let value = client
            .get(
                "/inventory/v1/devices",
                &[("limit", Some("10".to_string())), ("site", None)],
            )
            .await
            .unwrap();
        assert_eq!(value["total"], 1);
    }

    #[tokio::test]
    async fn test_none_params_omitted() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        // Strict matcher: a request carrying `site` would not match and the
        // expectation of exactly one call would fail on verification.
        Mock::given(http_method("GET"))
            .and(path("/monitoring/v2/aps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aps": [], "total": 0,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let value = client
            .get("/monitoring/v2/aps", &[("site", None)])
            .await
            .unwrap();
        assert_eq!(value["total"], 0);
    }

    #[tokio::test]
    async fn test_empty_success_body_decodes_to_empty_object() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        Mock::given(http_method("GET"))
            .and(path("/configuration/v1/groups"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let value = client.get("/configuration/v1/groups", &[]).await.unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_4xx_maps_to_upstream_client() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        Mock::given(http_method("GET"))
            .and(path("/network-monitoring/v1/firewall-sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("subscription scope"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .get("/network-monitoring/v1/firewall-sessions", &[])
            .await
            .unwrap_err();
        match err {
            GatewayError::UpstreamClient { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("subscription scope"));
            }
            other => panic!("expected UpstreamClient, got {other:?}"),
        }
        // Not retried: the mock's expect(1) verifies on drop.
    }

    #[tokio::test]
    async fn test_metrics_recorded_per_endpoint() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        Mock::given(http_method("GET"))
            .and(path("/monitoring/v1/clients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.get("/monitoring/v1/clients", &[]).await.unwrap();
        client.get("/monitoring/v1/clients", &[]).await.unwrap();

        let snapshot = client.metrics().snapshot();
        assert_eq!(snapshot.calls_to("/monitoring/v1/clients"), 2);
    }

    #[test]
    fn test_truncate_reason_bounds_and_utf8() {
        assert_eq!(truncate_reason("  short  "), "short");
        let long = "é".repeat(300);
        let out = truncate_reason(&long);
        assert!(out.len() <= 210);
        assert!(out.ends_with("..."));
    }
}
