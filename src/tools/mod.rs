//! Tool registry and dispatcher.
//!
//! Tools are the unit the AI client sees: a name, an input schema, and a
//! handler that turns validated arguments into a text report. The registry
//! is assembled once at startup and immutable afterwards; the dispatcher is
//! the single entry point through which every invocation flows, giving all
//! ~30 tools the same span handling, argument validation, and error
//! envelope.
//!
//! Handlers never write to the client stream and never catch auth or
//! circuit errors themselves; whatever they return or raise, the client
//! receives a well-formed report.

pub mod configuration;
pub mod health;
pub mod inventory;
pub mod monitoring;
pub mod network;
pub mod schema;
pub mod security;
pub mod troubleshooting;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::api::ApiClient;
use crate::error::GatewayResult;
use crate::report::Report;
use crate::telemetry::Telemetry;
use schema::InputSchema;

/// Shared state handed to every handler invocation.
pub struct ToolContext {
    /// The resilient HTTP surface. The only way handlers reach the vendor.
    pub api: ApiClient,
}

/// One network-operations tool.
///
/// Implementations are thin endpoint formatters: build parameters, call
/// [`ApiClient::call`] (any number of times), shape a report. Reports that
/// state numeric facts must end with a verification checkpoint, which the
/// report builder produces from the recorded facts.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Globally unique tool name.
    fn name(&self) -> &'static str;

    /// One-line description shown in tool discovery.
    fn description(&self) -> &'static str;

    /// Accepted arguments.
    fn input_schema(&self) -> InputSchema;

    /// Executes the tool with validated arguments (defaults applied).
    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report>;
}

/// Tool descriptor as exposed by `tools/list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Name → handler map, insertion-ordered for stable discovery output.
/// Immutable once the server starts serving.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the registry with the full tool catalog.
    #[must_use]
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        inventory::register(&mut registry);
        monitoring::register(&mut registry);
        network::register(&mut registry);
        configuration::register(&mut registry);
        security::register(&mut registry);
        troubleshooting::register(&mut registry);
        health::register(&mut registry);
        registry
    }

    /// Adds a handler. Duplicate names are a programming error caught at
    /// startup.
    ///
    /// # Panics
    ///
    /// Panics when a handler with the same name is already registered.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.name();
        assert!(
            !self.index.contains_key(name),
            "duplicate tool name: {name}"
        );
        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
    }

    /// Looks up a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.index.get(name).map(|&i| &self.handlers[i])
    }

    /// Ordered descriptors for tool discovery.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.handlers
            .iter()
            .map(|h| ToolDescriptor {
                name: h.name().to_string(),
                description: h.description().to_string(),
                input_schema: h.input_schema().to_json_schema(),
            })
            .collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// The single entry point for tool invocations.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
    telemetry: Telemetry,
}

impl Dispatcher {
    /// Creates a dispatcher over an immutable registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, api: ApiClient, telemetry: Telemetry) -> Self {
        Self {
            registry,
            ctx: ToolContext { api },
            telemetry,
        }
    }

    /// Ordered tool descriptors for discovery.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }

    /// Invokes a tool. Never fails at the protocol level: every error kind
    /// is converted into a one-segment report here, and stack traces stay
    /// in the logs keyed by correlation id.
    pub async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Report {
        let Some(handler) = self.registry.get(name) else {
            return Report::single(format!("[ERR] Unknown tool: {name}"));
        };

        let span = self.telemetry.start_span(name, &args);
        let correlation_id = span.correlation_id().to_string();

        let validated = match handler.input_schema().validate(&args) {
            Ok(validated) => validated,
            Err(violations) => {
                info!(
                    tool = name,
                    correlation_id = %correlation_id,
                    violations = violations.len(),
                    "rejected invalid tool input"
                );
                span.finish(false, Some("schema"));
                return Report::single(format!(
                    "[ERR] Invalid input for {name}: {}",
                    violations.join("; ")
                ));
            }
        };

        match handler.execute(&self.ctx, validated).await {
            Ok(report) => {
                span.finish(true, None);
                report
            }
            Err(err) => {
                error!(
                    tool = name,
                    correlation_id = %correlation_id,
                    error = %err,
                    kind = err.kind(),
                    "tool call failed"
                );
                span.finish(false, Some(err.kind()));
                Report::single(err.user_message(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::report::{Label, ReportBuilder};
    use super::schema::Field;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echoes its input"
        }

        fn input_schema(&self) -> InputSchema {
            InputSchema::new(vec![
                Field::string("text", "Text to echo").required(),
                Field::integer("repeat", "Repetitions").default_value(1).bounds(1, 5),
            ])
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            args: Map<String, Value>,
        ) -> GatewayResult<Report> {
            let text = schema::req_str(&args, "text")?;
            let repeat = schema::opt_i64(&args, "repeat").unwrap_or(1);
            let mut builder = ReportBuilder::new();
            for _ in 0..repeat {
                builder.line(Label::Info, &text);
            }
            builder.finish()
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn description(&self) -> &'static str {
            "Always fails"
        }

        fn input_schema(&self) -> InputSchema {
            InputSchema::empty()
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            _args: Map<String, Value>,
        ) -> GatewayResult<Report> {
            Err(GatewayError::upstream_server(502, "bad gateway"))
        }
    }

    async fn dispatcher() -> Dispatcher {
        let server = wiremock::MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aruba_client_id"), "id").unwrap();
        std::fs::write(dir.path().join("aruba_client_secret"), "secret").unwrap();
        std::fs::write(dir.path().join("aruba_base_url"), server.uri()).unwrap();
        let sources =
            crate::config::secrets::SecretSources::with_dirs(vec![dir.path().to_path_buf()]);
        let config = crate::config::Config::load_from(&sources).unwrap();

        let metrics = crate::telemetry::Metrics::new();
        let tokens = Arc::new(crate::auth::TokenManager::new(
            &config,
            reqwest::Client::new(),
            metrics.clone(),
        ));
        let limiter = Arc::new(crate::resilience::RateLimiter::new(
            100,
            std::time::Duration::from_secs(60),
            metrics.clone(),
        ));
        let breaker = Arc::new(crate::resilience::CircuitBreaker::new(
            5,
            std::time::Duration::from_secs(60),
            metrics.clone(),
        ));
        let api = ApiClient::new(&config, tokens, limiter, breaker, metrics).unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));
        Dispatcher::new(Arc::new(registry), api, Telemetry::disabled())
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_unknown_tool_report() {
        let dispatcher = dispatcher().await;
        let report = dispatcher
            .call_tool("does_not_exist", Map::new())
            .await;
        assert_eq!(report.as_str(), "[ERR] Unknown tool: does_not_exist");
    }

    #[tokio::test]
    async fn test_valid_call_produces_report() {
        let dispatcher = dispatcher().await;
        let report = dispatcher
            .call_tool("echo", args(serde_json::json!({"text": "hello"})))
            .await;
        assert_eq!(report.as_str(), "[INFO] hello\n");
    }

    #[tokio::test]
    async fn test_invalid_input_enumerates_violations() {
        let dispatcher = dispatcher().await;
        let report = dispatcher
            .call_tool("echo", args(serde_json::json!({"repeat": 99})))
            .await;
        let text = report.as_str();
        assert!(text.starts_with("[ERR] Invalid input for echo:"));
        assert!(text.contains("text is required"));
        assert!(text.contains("repeat must be at most 5"));
    }

    #[tokio::test]
    async fn test_handler_error_maps_to_envelope() {
        let dispatcher = dispatcher().await;
        let report = dispatcher.call_tool("failing", Map::new()).await;
        assert_eq!(report.as_str(), "[ERR] failing: Upstream server error");
    }

    #[tokio::test]
    async fn test_registry_ordering_stable() {
        let dispatcher = dispatcher().await;
        let tools = dispatcher.list_tools();
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[1].name, "failing");
        assert_eq!(tools[0].input_schema["properties"]["text"]["type"], "string");
    }

    #[test]
    #[should_panic(expected = "duplicate tool name")]
    fn test_duplicate_registration_panics() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
    }

    #[test]
    fn test_default_catalog_has_unique_names_and_schemas() {
        let registry = ToolRegistry::with_default_tools();
        assert!(registry.len() >= 25, "catalog has {} tools", registry.len());
        for descriptor in registry.descriptors() {
            assert_eq!(descriptor.input_schema["type"], "object");
            assert!(!descriptor.description.is_empty());
        }
    }
}
