//! Troubleshooting tools (`/troubleshooting/...`).
//!
//! Ping and traceroute are fire-and-forget on the vendor side: the POST
//! starts a diagnostic on the device and returns a task id. The caller
//! polls `get_async_test_result` with that id. Task ids are vendor-owned
//! and passed through verbatim; nothing here caches them.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{Label, Report, ReportBuilder};

use super::schema::{opt_str, req_str, Field, InputSchema};
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the troubleshooting tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(PingFromDevice));
    registry.register(Arc::new(TracerouteFromDevice));
    registry.register(Arc::new(GetAsyncTestResult));
}

/// Starts an async diagnostic and reports the task id to poll.
async fn start_diagnostic(
    ctx: &ToolContext,
    kind: &str,
    serial: &str,
    target: Option<String>,
) -> GatewayResult<Report> {
    let mut body = Map::new();
    if let Some(target) = &target {
        body.insert("host".to_string(), Value::String(target.clone()));
    }
    let data = ctx
        .api
        .post(
            &format!("/troubleshooting/v1/devices/{serial}/{kind}"),
            &[],
            Value::Object(body),
        )
        .await?;

    let task_id = data["task_id"]
        .as_u64()
        .map(|id| id.to_string())
        .or_else(|| data["task_id"].as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    let mut builder = ReportBuilder::new();
    builder.line(
        Label::Async,
        format!(
            "{kind} started on {serial}{}",
            target.map(|t| format!(" toward {t}")).unwrap_or_default()
        ),
    );
    builder.line(
        Label::Info,
        format!("Task id {task_id}; poll get_async_test_result for output"),
    );
    builder.fact("Task id", &task_id);
    builder.finish()
}

struct PingFromDevice;

#[async_trait]
impl ToolHandler for PingFromDevice {
    fn name(&self) -> &'static str {
        "ping_from_device"
    }

    fn description(&self) -> &'static str {
        "Start a ping from a managed device toward a target host"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("device_serial", "Serial of the device to ping from").required(),
            Field::string("target", "Host or IP to ping (device default gateway when omitted)"),
        ])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        start_diagnostic(ctx, "ping", &serial, opt_str(&args, "target")).await
    }
}

struct TracerouteFromDevice;

#[async_trait]
impl ToolHandler for TracerouteFromDevice {
    fn name(&self) -> &'static str {
        "traceroute_from_device"
    }

    fn description(&self) -> &'static str {
        "Start a traceroute from a managed device toward a target host"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("device_serial", "Serial of the device to trace from").required(),
            Field::string("target", "Host or IP to trace toward").required(),
        ])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        start_diagnostic(ctx, "traceroute", &serial, opt_str(&args, "target")).await
    }
}

struct GetAsyncTestResult;

#[async_trait]
impl ToolHandler for GetAsyncTestResult {
    fn name(&self) -> &'static str {
        "get_async_test_result"
    }

    fn description(&self) -> &'static str {
        "Poll the result of a previously started ping or traceroute"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("device_serial", "Serial the diagnostic ran on").required(),
            Field::string("task_id", "Task id returned when the diagnostic started").required(),
        ])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        let task_id = req_str(&args, "task_id")?;
        let data = ctx
            .api
            .get(
                &format!("/troubleshooting/v1/devices/{serial}/async_results"),
                &[("task_id", Some(task_id.clone()))],
            )
            .await?;

        let status = data["status"].as_str().unwrap_or("UNKNOWN");
        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Async,
            format!("Task {task_id} on {serial}: {status}"),
        );

        match status {
            "COMPLETED" => {
                let output = data["output"].as_str().unwrap_or("");
                builder.list(
                    Label::Data,
                    "Output",
                    output.lines().map(str::to_string).collect(),
                );
            }
            "RUNNING" | "PENDING" => {
                builder.line(Label::Info, "Still running; poll again shortly");
            }
            _ => {
                builder.line(
                    Label::Warn,
                    format!(
                        "Diagnostic did not complete: {}",
                        data["reason"].as_str().unwrap_or("no reason given")
                    ),
                );
            }
        }

        builder.fact("Task id", &task_id);
        builder.finish()
    }
}
