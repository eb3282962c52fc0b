//! Common test utilities and fixtures for Centra.
//!
//! Builds a complete gateway stack (token manager, rate limiter, circuit
//! breaker, API client, dispatcher) pointed at a wiremock server, with
//! credentials resolved from a temporary secrets directory.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use centra::auth::TokenManager;
use centra::config::secrets::SecretSources;
use centra::config::Config;
use centra::resilience::{CircuitBreaker, RateLimiter, RetryPolicy};
use centra::telemetry::{Metrics, Telemetry};
use centra::tools::{Dispatcher, ToolRegistry};
use centra::ApiClient;

/// A gateway stack wired to a mock vendor API.
pub struct TestGateway {
    /// The mock Aruba Central endpoint.
    pub server: MockServer,
    /// The resilient HTTP surface.
    pub api: ApiClient,
    /// Dispatcher over the full default tool catalog.
    pub dispatcher: Dispatcher,
    /// The shared tool catalog.
    pub registry: Arc<ToolRegistry>,
    /// Shared subsystem handles for assertions.
    pub tokens: Arc<TokenManager>,
    pub limiter: Arc<RateLimiter>,
    pub breaker: Arc<CircuitBreaker>,
    pub metrics: Metrics,
    _secrets_dir: tempfile::TempDir,
}

/// Extra knobs written into the secrets directory before config load.
#[derive(Default)]
pub struct GatewayOptions {
    /// Overrides `ARUBA_CIRCUIT_BREAKER_TIMEOUT` (seconds).
    pub breaker_timeout_secs: Option<u64>,
    /// Overrides `ARUBA_RATE_LIMIT_REQUESTS`.
    pub rate_limit_requests: Option<u32>,
    /// Overrides `ARUBA_RATE_LIMIT_WINDOW` (seconds).
    pub rate_limit_window_secs: Option<u64>,
    /// Replaces the default retry policy (tight budgets keep tests fast).
    pub retry: Option<RetryPolicy>,
}

impl TestGateway {
    /// Starts a mock server and builds the stack with default options.
    pub async fn start() -> Self {
        Self::start_with(GatewayOptions::default()).await
    }

    /// Starts a mock server and builds the stack.
    ///
    /// # Panics
    ///
    /// Panics on any setup failure; these are test-environment errors.
    pub async fn start_with(options: GatewayOptions) -> Self {
        let server = MockServer::start().await;

        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let write = |name: &str, value: &str| {
            std::fs::write(dir.path().join(name), value).expect("failed to write secret file");
        };
        write("aruba_client_id", "test-client");
        write("aruba_client_secret", "test-secret-value");
        write("aruba_base_url", &server.uri());
        if let Some(secs) = options.breaker_timeout_secs {
            write("aruba_circuit_breaker_timeout", &secs.to_string());
        }
        if let Some(requests) = options.rate_limit_requests {
            write("aruba_rate_limit_requests", &requests.to_string());
        }
        if let Some(secs) = options.rate_limit_window_secs {
            write("aruba_rate_limit_window", &secs.to_string());
        }

        let sources = SecretSources::with_dirs(vec![dir.path().to_path_buf()]);
        let config = Config::load_from(&sources).expect("config should load");

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

        let mut api = ApiClient::new(
            &config,
            Arc::clone(&tokens),
            Arc::clone(&limiter),
            Arc::clone(&breaker),
            metrics.clone(),
        )
        .expect("client should build");
        if let Some(retry) = options.retry {
            api = api.with_retry(retry);
        }

        let registry = Arc::new(ToolRegistry::with_default_tools());
        let dispatcher =
            Dispatcher::new(Arc::clone(&registry), api.clone(), Telemetry::disabled());

        Self {
            server,
            api,
            dispatcher,
            registry,
            tokens,
            limiter,
            breaker,
            metrics,
            _secrets_dir: dir,
        }
    }

    /// Builds another dispatcher over the same stack, for consumers that
    /// need to own one (the MCP server takes it by value).
    pub fn new_dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            self.api.clone(),
            Telemetry::disabled(),
        )
    }

    /// Mounts the OAuth2 token endpoint issuing `token`, asserting it is
    /// hit exactly `expected` times.
    pub async fn mount_token(&self, token: &str, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "expires_in": 7200,
            })))
            .expect(expected)
            .mount(&self.server)
            .await;
    }

    /// Installs a token directly, bypassing the token endpoint.
    pub async fn prime_token(&self, token: &str, expires_in: Duration) {
        self.tokens
            .prime(secrecy::SecretString::from(token.to_string()), expires_in)
            .await;
    }
}
