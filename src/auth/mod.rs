//! OAuth2 client-credentials token management.
//!
//! Aruba Central issues bearer tokens from `POST {base}/oauth2/token` with
//! `grant_type=client_credentials`. The [`TokenManager`] owns the one
//! process-wide credential record and keeps it fresh:
//!
//! - [`TokenManager::ensure_fresh`] refreshes proactively once the token is
//!   within the refresh buffer of its expiry.
//! - [`TokenManager::force_refresh`] bypasses the expiry check. The HTTP
//!   orchestrator calls it exactly once per call that sees a 401.
//!
//! Both are safe to call from any number of concurrent tasks. Duplicate
//! refreshes are suppressed by a token-value comparison rather than a
//! "refresh in progress" flag: each caller captures the token value it
//! observed, and inside the lock compares it against the current value. If
//! they differ, another task already refreshed and the current token is
//! returned as-is. See the module tests for the concurrent cases.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::telemetry::Metrics;

/// Mutable token state. The token and its expiry are always replaced
/// together under the manager's mutex, never partially.
struct TokenState {
    access_token: Option<SecretString>,
    expires_at: Option<Instant>,
}

/// Point-in-time view of the credential record, for the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStatus {
    /// Whether a token is currently held.
    pub present: bool,
    /// Seconds until the held token expires (0 when absent or expired).
    pub expires_in_secs: u64,
}

/// Acquires and proactively refreshes OAuth2 access tokens.
///
/// One instance exists per process. All mutation of the credential record
/// happens inside this type, under a single mutex.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    refresh_buffer: Duration,
    state: Mutex<TokenState>,
    refresh_count: AtomicU64,
    metrics: Metrics,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}

/// Response body of the OAuth2 token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl TokenManager {
    /// Creates a token manager from the runtime configuration.
    ///
    /// No token is acquired here; the first [`ensure_fresh`](Self::ensure_fresh)
    /// performs the initial exchange lazily.
    #[must_use]
    pub fn new(config: &Config, http: reqwest::Client, metrics: Metrics) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth2/token", config.base_url),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_buffer: config.refresh_buffer,
            state: Mutex::new(TokenState {
                access_token: None,
                expires_at: None,
            }),
            refresh_count: AtomicU64::new(0),
            metrics,
        }
    }

    /// Returns a token that is valid for at least the refresh buffer.
    ///
    /// Refreshes when `now >= expiry - refresh_buffer`. Concurrent callers
    /// that all observe an expired token produce exactly one OAuth2
    /// exchange; the rest receive the token that exchange installed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Auth`] when the token endpoint rejects the
    /// credentials, and network/timeout kinds when it is unreachable.
    pub async fn ensure_fresh(&self) -> GatewayResult<SecretString> {
        // Capture the token value before entering the critical section.
        let snapshot = self.state.lock().await.access_token.clone();

        let mut state = self.state.lock().await;

        // Another caller refreshed while we waited for the lock.
        if let Some(current) = refreshed_since(&state.access_token, snapshot.as_ref()) {
            debug!("token refreshed concurrently, reusing");
            return Ok(current);
        }

        if let (Some(token), Some(expires_at)) = (&state.access_token, state.expires_at) {
            if Instant::now() + self.refresh_buffer < expires_at {
                return Ok(token.clone());
            }
        }

        self.exchange(&mut state).await
    }

    /// Replaces the current token unconditionally, unless `stale` no longer
    /// matches the stored token (meaning another caller already refreshed).
    ///
    /// The orchestrator passes the token that was rejected with 401, so
    /// near-simultaneous 401s across calls converge on a single exchange.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ensure_fresh`](Self::ensure_fresh).
    pub async fn force_refresh(&self, stale: &SecretString) -> GatewayResult<SecretString> {
        let mut state = self.state.lock().await;

        if let Some(current) = refreshed_since(&state.access_token, Some(stale)) {
            debug!("token already replaced after 401, reusing");
            return Ok(current);
        }

        warn!("forcing token refresh after 401");
        self.exchange(&mut state).await
    }

    /// Installs an already-issued token, replacing any current one.
    ///
    /// Used to restore persisted state at startup and by tests that need to
    /// start from a known expiry.
    pub async fn prime(&self, token: SecretString, expires_in: Duration) {
        let mut state = self.state.lock().await;
        state.access_token = Some(token);
        state.expires_at = Some(Instant::now() + expires_in);
    }

    /// Returns the current token status for the health probe.
    pub async fn status(&self) -> TokenStatus {
        let state = self.state.lock().await;
        let expires_in_secs = state
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0);
        TokenStatus {
            present: state.access_token.is_some(),
            expires_in_secs,
        }
    }

    /// Number of OAuth2 exchanges performed since startup.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Performs the OAuth2 client-credentials exchange and installs the
    /// result. Called with the state lock held; the token and expiry are
    /// replaced together. On failure the current state is left untouched.
    async fn exchange(&self, state: &mut TokenState) -> GatewayResult<SecretString> {
        debug!(url = %self.token_url, "requesting access token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::auth(format!("undecodable token response: {e}")))?;

        let access_token = SecretString::from(token.access_token);
        state.access_token = Some(access_token.clone());
        state.expires_at = Some(Instant::now() + Duration::from_secs(token.expires_in));

        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_token_refresh();
        info!(expires_in = token.expires_in, "access token refreshed");

        Ok(access_token)
    }
}

/// If `current` holds a different token than `observed`, returns the current
/// one. `None` means no refresh happened in between.
fn refreshed_since(
    current: &Option<SecretString>,
    observed: Option<&SecretString>,
) -> Option<SecretString> {
    let current = current.as_ref()?;
    match observed {
        Some(seen) if seen.expose_secret() == current.expose_secret() => None,
        // Either the caller had no token yet or it held a stale one.
        Some(_) => Some(current.clone()),
        None => Some(current.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secrets::SecretSources;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn manager_for(server: &MockServer) -> TokenManager {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aruba_client_id"), "test-client").unwrap();
        std::fs::write(dir.path().join("aruba_client_secret"), "test-secret").unwrap();
        std::fs::write(dir.path().join("aruba_base_url"), server.uri()).unwrap();
        let sources = SecretSources::with_dirs(vec![dir.path().to_path_buf()]);
        let config = Config::load_from(&sources).unwrap();
        TokenManager::new(&config, reqwest::Client::new(), Metrics::new())
    }

    fn token_mock(token: &str) -> Mock {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "expires_in": 7200,
            })))
    }

    #[tokio::test]
    async fn test_lazy_initial_exchange() {
        let server = MockServer::start().await;
        token_mock("tok-1").expect(1).mount(&server).await;

        let manager = manager_for(&server).await;
        assert_eq!(manager.refresh_count(), 0);

        let token = manager.ensure_fresh().await.unwrap();
        assert_eq!(token.expose_secret(), "tok-1");
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_token_is_reused() {
        let server = MockServer::start().await;
        token_mock("tok-1").expect(1).mount(&server).await;

        let manager = manager_for(&server).await;
        manager.ensure_fresh().await.unwrap();
        manager.ensure_fresh().await.unwrap();
        manager.ensure_fresh().await.unwrap();
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_refresh() {
        let server = MockServer::start().await;
        token_mock("tok-2").expect(1).mount(&server).await;

        let manager = manager_for(&server).await;
        manager
            .prime(SecretString::from("tok-old"), Duration::ZERO)
            .await;

        let token = manager.ensure_fresh().await.unwrap();
        assert_eq!(token.expose_secret(), "tok-2");
    }

    #[tokio::test]
    async fn test_token_within_buffer_triggers_refresh() {
        let server = MockServer::start().await;
        token_mock("tok-2").expect(1).mount(&server).await;

        let manager = manager_for(&server).await;
        // 30 s left is inside the 60 s refresh buffer.
        manager
            .prime(SecretString::from("tok-old"), Duration::from_secs(30))
            .await;

        let token = manager.ensure_fresh().await.unwrap();
        assert_eq!(token.expose_secret(), "tok-2");
    }

    #[tokio::test]
    async fn test_token_outside_buffer_not_refreshed() {
        let server = MockServer::start().await;
        token_mock("tok-2").expect(0).mount(&server).await;

        let manager = manager_for(&server).await;
        manager
            .prime(SecretString::from("tok-old"), Duration::from_secs(3600))
            .await;

        let token = manager.ensure_fresh().await.unwrap();
        assert_eq!(token.expose_secret(), "tok-old");
    }

    #[tokio::test]
    async fn test_concurrent_ensure_fresh_single_exchange() {
        let server = MockServer::start().await;
        token_mock("tok-new").expect(1).mount(&server).await;

        let manager = Arc::new(manager_for(&server).await);
        manager
            .prime(SecretString::from("tok-old"), Duration::ZERO)
            .await;

        let tasks = (0..16).map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.ensure_fresh().await.unwrap() })
        });

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().expose_secret(), "tok-new");
        }
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_force_refresh_single_exchange() {
        let server = MockServer::start().await;
        token_mock("tok-new").expect(1).mount(&server).await;

        let manager = Arc::new(manager_for(&server).await);
        manager
            .prime(SecretString::from("tok-stale"), Duration::from_secs(3600))
            .await;

        let stale = SecretString::from("tok-stale");
        let tasks = (0..10).map(|_| {
            let manager = Arc::clone(&manager);
            let stale = stale.clone();
            tokio::spawn(async move { manager.force_refresh(&stale).await.unwrap() })
        });

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().expose_secret(), "tok-new");
        }
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let manager = manager_for(&server).await;
        let err = manager.ensure_fresh().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth { .. }));
        // State untouched: no token installed by the failed exchange.
        assert!(!manager.status().await.present);
        assert_eq!(manager.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_expiry() {
        let server = MockServer::start().await;
        let manager = manager_for(&server).await;

        let status = manager.status().await;
        assert!(!status.present);
        assert_eq!(status.expires_in_secs, 0);

        manager
            .prime(SecretString::from("tok"), Duration::from_secs(600))
            .await;
        let status = manager.status().await;
        assert!(status.present);
        assert!(status.expires_in_secs > 590 && status.expires_in_secs <= 600);
    }
}
