//! Centralized error types for Centra.
//!
//! This module provides a unified error type (`GatewayError`) that encompasses
//! all error conditions across the application. Using a single error type
//! provides:
//!
//! - Consistent error handling patterns
//! - Clear error categorization (retryable, breaker-tripping, etc.)
//! - A single place where errors map to user-visible report text
//!
//! # Example
//!
//! ```
//! use centra::error::{GatewayError, GatewayResult};
//!
//! fn check_limit(limit: i64) -> GatewayResult<()> {
//!     if limit > 1000 {
//!         return Err(GatewayError::schema("limit", "must be at most 1000"));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_limit(5000).unwrap_err();
//! assert!(!err.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;

/// Result type alias using `GatewayError`.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Centralized error type for Centra.
///
/// Variants correspond to the error kinds the call path distinguishes:
/// what gets retried, what trips the circuit breaker, and what each kind
/// looks like when rendered into a tool report.
#[derive(Debug)]
pub enum GatewayError {
    /// Invalid or missing configuration. Fatal at startup.
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// Credential failure: the OAuth2 exchange was rejected, or a request
    /// still returned 401 after one forced refresh.
    Auth {
        /// Description of the authentication failure.
        message: String,
    },

    /// The circuit breaker rejected the call without performing I/O.
    CircuitOpen {
        /// Time remaining until a probe request will be admitted.
        retry_in: Duration,
    },

    /// Upstream returned a 4xx other than 401.
    UpstreamClient {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Upstream returned a 5xx.
    UpstreamServer {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Upstream returned 429. Internal to the retry loop; if retries
    /// exhaust, this is what the caller sees.
    RateLimited {
        /// Parsed `Retry-After` header, if the server sent one.
        retry_after: Option<Duration>,
    },

    /// Connect or overall request deadline exceeded.
    Timeout {
        /// Description of the timed-out operation.
        message: String,
    },

    /// Connection-level I/O failure.
    Network {
        /// Description of the network error.
        message: String,
    },

    /// A tool argument failed schema validation.
    Schema {
        /// The offending field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The caller abandoned the call.
    Cancelled,

    /// The vendor returned a 2xx body that could not be decoded.
    InvalidResponse {
        /// Description of the decode failure.
        message: String,
    },

    /// A report-builder invariant was violated (checkpoint sum mismatch).
    Report {
        /// Description of the violated invariant.
        message: String,
    },

    /// Error from anyhow or other sources.
    Other {
        /// The wrapped error message.
        message: String,
    },
}

// ============== Constructor Methods ==============

impl GatewayError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a circuit-open error.
    #[must_use]
    pub fn circuit_open(retry_in: Duration) -> Self {
        Self::CircuitOpen { retry_in }
    }

    /// Creates an upstream client error (4xx other than 401).
    #[must_use]
    pub fn upstream_client(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamClient {
            status,
            message: message.into(),
        }
    }

    /// Creates an upstream server error (5xx).
    #[must_use]
    pub fn upstream_server(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamServer {
            status,
            message: message.into(),
        }
    }

    /// Creates a rate-limited error.
    #[must_use]
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a schema validation error.
    #[must_use]
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a report invariant error.
    #[must_use]
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }
}

// ============== Category Methods ==============

impl GatewayError {
    /// Returns `true` if the retry wrapper should re-attempt after this error.
    ///
    /// Retryable: network errors, timeouts, 429, and 502/503/504.
    /// Everything else (including plain 500 and 401) surfaces immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::UpstreamServer { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns `true` if the circuit breaker counts this error as a failure.
    ///
    /// Failures: any 5xx plus network/timeout errors. 4xx responses
    /// (including 429) and cancellation are neutral for the breaker.
    #[must_use]
    pub fn trips_breaker(&self) -> bool {
        matches!(
            self,
            Self::UpstreamServer { .. } | Self::Network { .. } | Self::Timeout { .. }
        )
    }

    /// Short stable label for this error kind, used in span attributes and
    /// structured log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Auth { .. } => "auth",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::UpstreamClient { .. } => "upstream_client",
            Self::UpstreamServer { .. } => "upstream_server",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::Network { .. } => "network",
            Self::Schema { .. } => "schema",
            Self::Cancelled => "cancelled",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Report { .. } => "report",
            Self::Other { .. } => "other",
        }
    }

    /// Returns the `Retry-After` duration if this is a 429 that carried one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Renders this error as the single-segment report text the dispatcher
    /// returns to the client. Stack traces and internals stay in the logs.
    #[must_use]
    pub fn user_message(&self, tool: &str) -> String {
        match self {
            Self::Auth { .. } => "[ERR] Authentication failed".to_string(),
            Self::CircuitOpen { retry_in } => format!(
                "[ERR] Upstream temporarily unavailable (retry in {}s)",
                retry_in.as_secs()
            ),
            Self::UpstreamClient { status, message } => {
                format!("[ERR] {tool}: upstream rejected the request ({status}): {message}")
            }
            Self::RateLimited { .. } => {
                format!("[ERR] {tool}: upstream rejected the request (429): rate limited")
            }
            Self::UpstreamServer { .. } => format!("[ERR] {tool}: Upstream server error"),
            Self::Timeout { .. } => format!("[ERR] {tool}: Request timed out"),
            Self::Schema { field, reason } => format!("[ERR] {tool}: {field} {reason}"),
            Self::Cancelled => format!("[ERR] {tool}: Request cancelled"),
            Self::Network { .. } => format!("[ERR] {tool}: Network error reaching upstream"),
            Self::Config { message }
            | Self::InvalidResponse { message }
            | Self::Report { message }
            | Self::Other { message } => format!("[ERR] {tool}: {message}"),
        }
    }
}

// ============== Display Implementation ==============

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "config: {message}"),
            Self::Auth { message } => write!(f, "auth: {message}"),
            Self::CircuitOpen { retry_in } => {
                write!(f, "circuit open, retry in {}s", retry_in.as_secs())
            }
            Self::UpstreamClient { status, message } => {
                write!(f, "upstream client error {status}: {message}")
            }
            Self::UpstreamServer { status, message } => {
                write!(f, "upstream server error {status}: {message}")
            }
            Self::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limited, retry after {}s", d.as_secs()),
                None => write!(f, "rate limited"),
            },
            Self::Timeout { message } => write!(f, "timeout: {message}"),
            Self::Network { message } => write!(f, "network: {message}"),
            Self::Schema { field, reason } => write!(f, "invalid argument '{field}': {reason}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidResponse { message } => write!(f, "invalid response: {message}"),
            Self::Report { message } => write!(f, "report: {message}"),
            Self::Other { message } => write!(f, "error: {message}"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ============== Conversion Implementations ==============

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            message: format!("{err:#}"),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

// ============== Unit Tests ==============
