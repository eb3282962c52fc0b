//! JSON-RPC 2.0 protocol types for MCP communication.
//!
//! These are the wire shapes the server reads and writes. A request without
//! an id is a notification and gets no response.
//!
//! # Example
//!
//! ```
//! use centra::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
//! use serde_json::json;
//!
//! let request: JsonRpcRequest =
//!     serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#)
//!         .unwrap();
//! assert_eq!(request.method(), "tools/list");
//!
//! let response = JsonRpcResponse::success(json!(1), json!({"tools": []}));
//! assert!(serde_json::to_string(&response).unwrap().contains("\"jsonrpc\":\"2.0\""));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version, always "2.0"
    jsonrpc: String,

    /// Request ID (absent for notifications)
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,

    /// Method name to invoke
    method: String,

    /// Method parameters
    #[serde(default)]
    params: Value,
}

impl JsonRpcRequest {
    /// Creates a new request. Used by protocol tests; the server itself only
    /// parses requests.
    #[must_use]
    pub fn new(id: i64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::from(id)),
            method: method.to_string(),
            params,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request parameters.
    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Returns the request ID, if present.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// Returns true if this is a notification (no ID, no response expected).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors)
    code: i32,

    /// Human-readable error message
    message: String,

    /// Additional error data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcError {
    /// Creates a new JSON-RPC error.
    #[must_use]
    pub fn new(code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            code,
            message,
            data,
        }
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Parse error (-32700): invalid JSON was received.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error".to_string(), None)
    }

    /// Invalid Request (-32600): the JSON is not a valid request object.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(-32600, "Invalid Request".to_string(), None)
    }

    /// Method not found (-32601).
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {method}"), None)
    }

    /// Invalid params (-32602).
    #[must_use]
    pub fn invalid_params(details: &str) -> Self {
        Self::new(-32602, format!("Invalid params: {details}"), None)
    }
}

/// A JSON-RPC 2.0 response message. Contains either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version, always "2.0"
    jsonrpc: String,

    /// Request ID this response corresponds to
    id: Value,

    /// Result value (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,

    /// Error object (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response. A null id is used when the request id
    /// could not be read (parse errors).
    #[must_use]
    pub fn new_error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(error),
        }
    }

    /// Returns true if this response indicates an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the result value, if present.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error object, if present.
    #[must_use]
    pub fn error(&self) -> Option<&JsonRpcError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_roundtrip() {
        let parsed: JsonRpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"abc","method":"tools/call","params":{"name":"x"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.method(), "tools/call");
        assert_eq!(parsed.id(), Some(&json!("abc")));
        assert!(!parsed.is_notification());
    }

    #[test]
    fn test_notification_has_no_id() {
        let parsed: JsonRpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .unwrap();
        assert!(parsed.is_notification());
        assert_eq!(parsed.params(), &Value::Null);
    }

    #[test]
    fn test_success_response_shape() {
        let response = JsonRpcResponse::success(json!(1), json!({"ok": true}));
        let rendered = serde_json::to_string(&response).unwrap();
        assert!(rendered.contains("\"result\""));
        assert!(!rendered.contains("\"error\""));
    }

    #[test]
    fn test_error_response_null_id() {
        let response = JsonRpcResponse::new_error(None, JsonRpcError::parse_error());
        let rendered = serde_json::to_string(&response).unwrap();
        assert!(rendered.contains("\"id\":null"));
        assert!(rendered.contains("-32700"));
    }

    #[test]
    fn test_error_display() {
        let error = JsonRpcError::method_not_found("bogus/method");
        assert_eq!(format!("{error}"), "[-32601] Method not found: bogus/method");
    }
}
