//! Configuration for Centra.
//!
//! Configuration comes from environment variables (with secret-file
//! overrides, see [`secrets`]) and is resolved once at startup. Missing
//! required credentials are fatal: the process logs the problem and exits
//! with code 1 before the protocol loop ever starts.
//!
//! # Security Note
//!
//! `client_secret` is held as a [`SecretString`] so it cannot leak through
//! `Debug` formatting or accidental logging.

pub mod secrets;

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{GatewayError, GatewayResult};
use secrets::SecretSources;

/// Regional Aruba Central API gateways. `ARUBA_BASE_URL` accepts either one
/// of these aliases or a full `https://` URL.
const REGIONS: [(&str, &str); 4] = [
    ("us-1", "https://app1-apigw.central.arubanetworks.com"),
    ("us-2", "https://apigw-uswest4.central.arubanetworks.com"),
    ("eu-1", "https://eu-apigw.central.arubanetworks.com"),
    ("apac-1", "https://api-ap.central.arubanetworks.com"),
];

/// Default region when `ARUBA_BASE_URL` is unset.
const DEFAULT_REGION: &str = "us-1";

/// Default overall request timeout in seconds (`ARUBA_API_TIMEOUT`).
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout. Not separately configurable.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default rate limit: 100 requests per 60 second window.
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default circuit breaker: trip after 5 consecutive failures, stay open 60 s.
const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
const DEFAULT_BREAKER_TIMEOUT_SECS: u64 = 60;

/// Tokens are refreshed this long before their reported expiry.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Runtime configuration, resolved once at startup.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the regional API gateway (no trailing slash).
    pub base_url: String,

    /// OAuth2 client id.
    pub client_id: String,

    /// OAuth2 client secret.
    pub client_secret: SecretString,

    /// Overall per-request timeout.
    pub api_timeout: Duration,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Rate limiter bucket capacity (requests per window).
    pub rate_limit_requests: u32,

    /// Rate limiter window duration.
    pub rate_limit_window: Duration,

    /// Consecutive failures before the circuit breaker opens.
    pub breaker_threshold: u32,

    /// How long the breaker stays open before admitting a probe.
    pub breaker_timeout: Duration,

    /// How long before token expiry a refresh is triggered.
    pub refresh_buffer: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_timeout", &self.api_timeout)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("breaker_threshold", &self.breaker_threshold)
            .field("breaker_timeout", &self.breaker_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Loads configuration from the default layered sources.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a required credential is missing
    /// or a numeric variable fails to parse.
    pub fn load() -> GatewayResult<Self> {
        Self::load_from(&SecretSources::default())
    }

    /// Loads configuration using the given secret sources (injectable for
    /// tests).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a required credential is missing
    /// or a numeric variable fails to parse.
    pub fn load_from(sources: &SecretSources) -> GatewayResult<Self> {
        let client_id = sources
            .resolve("ARUBA_CLIENT_ID")
            .ok_or_else(|| GatewayError::config("ARUBA_CLIENT_ID is required"))?;
        let client_secret = sources
            .resolve("ARUBA_CLIENT_SECRET")
            .ok_or_else(|| GatewayError::config("ARUBA_CLIENT_SECRET is required"))?;

        let base_url = match sources.resolve("ARUBA_BASE_URL") {
            Some(value) => resolve_base_url(&value)?,
            None => resolve_base_url(DEFAULT_REGION)?,
        };

        Ok(Self {
            base_url,
            client_id,
            client_secret: SecretString::from(client_secret),
            api_timeout: Duration::from_secs(parse_var(
                sources,
                "ARUBA_API_TIMEOUT",
                DEFAULT_API_TIMEOUT_SECS,
            )?),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            rate_limit_requests: parse_var(
                sources,
                "ARUBA_RATE_LIMIT_REQUESTS",
                DEFAULT_RATE_LIMIT_REQUESTS,
            )?,
            rate_limit_window: Duration::from_secs(parse_var(
                sources,
                "ARUBA_RATE_LIMIT_WINDOW",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
            breaker_threshold: parse_var(
                sources,
                "ARUBA_CIRCUIT_BREAKER_THRESHOLD",
                DEFAULT_BREAKER_THRESHOLD,
            )?,
            breaker_timeout: Duration::from_secs(parse_var(
                sources,
                "ARUBA_CIRCUIT_BREAKER_TIMEOUT",
                DEFAULT_BREAKER_TIMEOUT_SECS,
            )?),
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
        })
    }

    /// Returns the known region aliases, for help text and error messages.
    #[must_use]
    pub fn region_aliases() -> Vec<&'static str> {
        REGIONS.iter().map(|(alias, _)| *alias).collect()
    }
}

/// Maps a region alias to its gateway URL, or validates a full URL.
/// Plain `http://` is accepted for internal gateways and test harnesses.
fn resolve_base_url(value: &str) -> GatewayResult<String> {
    if let Some((_, url)) = REGIONS.iter().find(|(alias, _)| *alias == value) {
        return Ok((*url).to_string());
    }
    if value.starts_with("https://") || value.starts_with("http://") {
        return Ok(value.trim_end_matches('/').to_string());
    }
    Err(GatewayError::config(format!(
        "ARUBA_BASE_URL must be a URL or one of: {}",
        Config::region_aliases().join(", ")
    )))
}

/// Parses a numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(
    sources: &SecretSources,
    var: &str,
    default: T,
) -> GatewayResult<T> {
    match sources.resolve(var) {
        Some(raw) => raw
            .parse()
            .map_err(|_| GatewayError::config(format!("{var}: '{raw}' is not a valid number"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn sources_with(entries: &[(&str, &str)]) -> (tempfile::TempDir, SecretSources) {
        let dir = tempfile::tempdir().unwrap();
        for (var, value) in entries {
            std::fs::write(dir.path().join(var.to_lowercase()), value).unwrap();
        }
        let sources = SecretSources::with_dirs(vec![dir.path().to_path_buf()]);
        (dir, sources)
    }

    #[test]
    fn test_load_with_defaults() {
        let (_dir, sources) = sources_with(&[
            ("ARUBA_CLIENT_ID", "client-abc"),
            ("ARUBA_CLIENT_SECRET", "s3cret"),
        ]);

        let config = Config::load_from(&sources).unwrap();
        assert_eq!(config.base_url, "https://app1-apigw.central.arubanetworks.com");
        assert_eq!(config.client_id, "client-abc");
        assert_eq!(config.client_secret.expose_secret(), "s3cret");
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.breaker_threshold, 5);
        assert_eq!(config.breaker_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_credentials_is_fatal() {
        let (_dir, sources) = sources_with(&[("ARUBA_CLIENT_ID", "client-abc")]);
        let err = Config::load_from(&sources).unwrap_err();
        assert!(err.to_string().contains("ARUBA_CLIENT_SECRET"));
    }

    #[test]
    fn test_region_alias_resolution() {
        let (_dir, sources) = sources_with(&[
            ("ARUBA_CLIENT_ID", "id"),
            ("ARUBA_CLIENT_SECRET", "secret"),
            ("ARUBA_BASE_URL", "eu-1"),
        ]);
        let config = Config::load_from(&sources).unwrap();
        assert_eq!(config.base_url, "https://eu-apigw.central.arubanetworks.com");
    }

    #[test]
    fn test_full_url_accepted_and_normalized() {
        let (_dir, sources) = sources_with(&[
            ("ARUBA_CLIENT_ID", "id"),
            ("ARUBA_CLIENT_SECRET", "secret"),
            ("ARUBA_BASE_URL", "https://internal-apigw.example.net/"),
        ]);
        let config = Config::load_from(&sources).unwrap();
        assert_eq!(config.base_url, "https://internal-apigw.example.net");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let (_dir, sources) = sources_with(&[
            ("ARUBA_CLIENT_ID", "id"),
            ("ARUBA_CLIENT_SECRET", "secret"),
            ("ARUBA_BASE_URL", "ftp://nope"),
        ]);
        assert!(Config::load_from(&sources).is_err());
    }

    #[test]
    fn test_unparseable_number_is_config_error() {
        let (_dir, sources) = sources_with(&[
            ("ARUBA_CLIENT_ID", "id"),
            ("ARUBA_CLIENT_SECRET", "secret"),
            ("ARUBA_RATE_LIMIT_REQUESTS", "a lot"),
        ]);
        let err = Config::load_from(&sources).unwrap_err();
        assert!(err.to_string().contains("ARUBA_RATE_LIMIT_REQUESTS"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let (_dir, sources) = sources_with(&[
            ("ARUBA_CLIENT_ID", "id"),
            ("ARUBA_CLIENT_SECRET", "super-secret-value"),
        ]);
        let config = Config::load_from(&sources).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
