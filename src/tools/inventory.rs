//! Device inventory tools (`/inventory/...`).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{format, Label, Report, ReportBuilder};

use super::schema::{opt_i64, opt_str, req_str, Field, InputSchema};
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the inventory tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetDeviceList));
    registry.register(Arc::new(GetDeviceDetails));
    registry.register(Arc::new(GetInventorySummary));
}

/// Maps a vendor status string to an up/down label.
fn status_label(status: &str) -> Label {
    if status.eq_ignore_ascii_case("up") {
        Label::Up
    } else {
        Label::Dn
    }
}

/// Lists devices in the Central inventory, optionally filtered by type.
struct GetDeviceList;

#[async_trait]
impl ToolHandler for GetDeviceList {
    fn name(&self) -> &'static str {
        "get_device_list"
    }

    fn description(&self) -> &'static str {
        "List devices in the Aruba Central inventory with status and site"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("device_type", "Filter by device type")
                .one_of(&["ap", "switch", "gateway"]),
            Field::integer("limit", "Maximum devices to return")
                .default_value(50)
                .bounds(1, 1000),
            Field::integer("offset", "Pagination offset")
                .default_value(0)
                .bounds(0, 100_000),
        ])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get(
                "/inventory/v1/devices",
                &[
                    ("device_type", opt_str(&args, "device_type")),
                    ("limit", opt_i64(&args, "limit").map(|v| v.to_string())),
                    ("offset", opt_i64(&args, "offset").map(|v| v.to_string())),
                ],
            )
            .await?;

        let devices = data["devices"].as_array().cloned().unwrap_or_default();
        let total = devices.len() as u64;
        let up = devices
            .iter()
            .filter(|d| d["status"].as_str().is_some_and(|s| s.eq_ignore_ascii_case("up")))
            .count() as u64;
        let down = total - up;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Stats,
            format!("Device inventory: {total} devices ({up} up, {down} down)"),
        );
        builder.list(
            Label::Dev,
            "Devices",
            devices
                .iter()
                .map(|d| {
                    format!(
                        "{} {} {} ({}) at {}",
                        d["status"].as_str().unwrap_or("?"),
                        d["serial"].as_str().unwrap_or("?"),
                        d["model"].as_str().unwrap_or("?"),
                        d["device_type"].as_str().unwrap_or("?"),
                        d["site"].as_str().unwrap_or("unassigned"),
                    )
                })
                .collect(),
        );

        builder.fact_sum("Total devices", total, &[up, down])?;
        builder.fact("Devices up", up);
        builder.fact("Devices down", down);
        builder.finish()
    }
}

/// Detailed view of one device by serial.
struct GetDeviceDetails;

#[async_trait]
impl ToolHandler for GetDeviceDetails {
    fn name(&self) -> &'static str {
        "get_device_details"
    }

    fn description(&self) -> &'static str {
        "Show model, firmware, uptime, and resource usage for one device"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string(
            "device_serial",
            "Serial number of the device",
        )
        .required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        let data = ctx
            .api
            .get(&format!("/inventory/v1/devices/{serial}"), &[])
            .await?;

        let status = data["status"].as_str().unwrap_or("Unknown");
        let uptime_secs = data["uptime"].as_u64().unwrap_or(0);
        let cpu = data["cpu_utilization"].as_f64().unwrap_or(0.0);
        let mem_total = data["mem_total"].as_u64().unwrap_or(0);
        let mem_free = data["mem_free"].as_u64().unwrap_or(0);

        let uptime = format::uptime(uptime_secs);
        let cpu_pct = format::percent(cpu);

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Dev,
            format!(
                "{serial}: {} ({})",
                data["model"].as_str().unwrap_or("unknown model"),
                data["device_type"].as_str().unwrap_or("?"),
            ),
        );
        builder.line(status_label(status), format!("Status: {status}, uptime {uptime}"));
        builder.line(
            Label::Info,
            format!(
                "Firmware {}, IP {}",
                data["firmware_version"].as_str().unwrap_or("?"),
                data["ip_address"].as_str().unwrap_or("?"),
            ),
        );
        builder.line(
            Label::Stats,
            format!(
                "CPU {cpu_pct}, memory {} free of {}",
                format::bytes(mem_free),
                format::bytes(mem_total),
            ),
        );

        builder.fact("Uptime", &uptime);
        builder.fact("CPU utilization", &cpu_pct);
        builder.fact("Memory free", format::bytes(mem_free));
        builder.finish()
    }
}

/// Fleet-wide counts by device type and status.
struct GetInventorySummary;

#[async_trait]
impl ToolHandler for GetInventorySummary {
    fn name(&self) -> &'static str {
        "get_inventory_summary"
    }

    fn description(&self) -> &'static str {
        "Summarize the device fleet by type and status"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::empty()
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx.api.get("/inventory/v1/devices/summary", &[]).await?;

        let aps = data["aps"].as_u64().unwrap_or(0);
        let switches = data["switches"].as_u64().unwrap_or(0);
        let gateways = data["gateways"].as_u64().unwrap_or(0);
        let total = data["total"].as_u64().unwrap_or(aps + switches + gateways);
        let online = data["online"].as_u64().unwrap_or(0);
        let offline = data["offline"].as_u64().unwrap_or(0);

        let mut builder = ReportBuilder::new();
        builder.line(Label::Stats, format!("Fleet summary: {total} devices"));
        builder.line(Label::Ap, format!("Access points: {aps}"));
        builder.line(Label::Sw, format!("Switches: {switches}"));
        builder.line(Label::Gw, format!("Gateways: {gateways}"));
        builder.line(Label::Up, format!("Online: {online}"));
        builder.line(Label::Dn, format!("Offline: {offline}"));

        builder.fact_sum("Total devices", total, &[aps, switches, gateways])?;
        builder.fact("Access points", aps);
        builder.fact("Switches", switches);
        builder.fact("Gateways", gateways);
        builder.finish()
    }
}
