//! Centra - MCP tool gateway for Aruba Central network operations

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use centra::auth::TokenManager;
use centra::config::Config;
use centra::error::GatewayError;
use centra::mcp::McpServer;
use centra::resilience::{CircuitBreaker, RateLimiter};
use centra::telemetry::{Metrics, Telemetry};
use centra::tools::{Dispatcher, ToolRegistry};
use centra::ApiClient;

#[derive(Parser, Debug)]
#[command(name = "centra")]
#[command(about = "Centra - MCP tool gateway for Aruba Central network operations")]
#[command(version)]
struct Args {
    /// Enable debug logging (logs go to stderr; stdout carries the protocol)
    #[arg(long)]
    debug: bool,

    /// Print the tool catalog and exit
    #[arg(long)]
    list_tools: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // stdout is the protocol stream; all logging goes to stderr.
    let default_filter = if args.debug { "centra=debug" } else { "centra=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = Arc::new(ToolRegistry::with_default_tools());

    if args.list_tools {
        for descriptor in registry.descriptors() {
            println!("{:<28} {}", descriptor.name, descriptor.description);
        }
        return ExitCode::SUCCESS;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "fatal configuration error");
            return ExitCode::from(1);
        }
    };

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

    let api = match ApiClient::new(&config, tokens, limiter, breaker, metrics) {
        Ok(api) => api,
        Err(e) => {
            error!(error = %e, "fatal configuration error");
            return ExitCode::from(1);
        }
    };

    let telemetry = Telemetry::from_env();
    info!(
        base_url = %config.base_url,
        tools = registry.len(),
        tracing = telemetry.is_enabled(),
        "centra starting"
    );

    let dispatcher = Dispatcher::new(registry, api, telemetry);
    match McpServer::new(dispatcher).serve_stdio().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(GatewayError::Config { message }) => {
            error!(%message, "fatal configuration error");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "fatal runtime error");
            ExitCode::from(2)
        }
    }
}
