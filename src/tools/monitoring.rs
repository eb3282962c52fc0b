//! Monitoring tools (`/monitoring/...`): device status, clients, sites,
//! and bandwidth usage.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{format, Label, Report, ReportBuilder};

use super::schema::{opt_i64, opt_str, req_str, Field, InputSchema};
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the monitoring tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetAccessPoints));
    registry.register(Arc::new(GetApDetails));
    registry.register(Arc::new(GetSwitches));
    registry.register(Arc::new(GetSwitchDetails));
    registry.register(Arc::new(GetGateways));
    registry.register(Arc::new(GetGatewayDetails));
    registry.register(Arc::new(GetConnectedClients));
    registry.register(Arc::new(GetClientDetails));
    registry.register(Arc::new(GetSitesHealth));
    registry.register(Arc::new(GetSiteDetails));
    registry.register(Arc::new(GetTopBandwidthClients));
    registry.register(Arc::new(GetNetworkUsageTrend));
}

/// Standard list paging arguments shared by the fleet listing tools.
fn paging_fields() -> Vec<Field> {
    vec![
        Field::string("site", "Filter by site name"),
        Field::integer("limit", "Maximum entries to return")
            .default_value(50)
            .bounds(1, 1000),
        Field::integer("offset", "Pagination offset")
            .default_value(0)
            .bounds(0, 100_000),
    ]
}

fn paging_params(args: &Map<String, Value>) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("site", opt_str(args, "site")),
        ("limit", opt_i64(args, "limit").map(|v| v.to_string())),
        ("offset", opt_i64(args, "offset").map(|v| v.to_string())),
    ]
}

/// Counts entries whose `status` field is "Up" (case-insensitive).
fn count_up(entries: &[Value]) -> u64 {
    entries
        .iter()
        .filter(|e| e["status"].as_str().is_some_and(|s| s.eq_ignore_ascii_case("up")))
        .count() as u64
}

/// Shared shape for the three fleet listing tools: header, per-device list,
/// and an up/down checkpoint.
fn fleet_report(
    kind_label: Label,
    kind_name: &str,
    entries: &[Value],
) -> GatewayResult<Report> {
    let total = entries.len() as u64;
    let up = count_up(entries);
    let down = total - up;

    let mut builder = ReportBuilder::new();
    builder.line(
        Label::Stats,
        format!("{kind_name}: {total} total ({up} up, {down} down)"),
    );
    builder.list(
        kind_label,
        kind_name,
        entries
            .iter()
            .map(|e| {
                format!(
                    "{} {} ({}) {} clients, site {}",
                    e["status"].as_str().unwrap_or("?"),
                    e["name"].as_str().unwrap_or_else(|| e["serial"].as_str().unwrap_or("?")),
                    e["serial"].as_str().unwrap_or("?"),
                    e["client_count"].as_u64().unwrap_or(0),
                    e["site"].as_str().unwrap_or("unassigned"),
                )
            })
            .collect(),
    );

    builder.fact_sum(format!("Total {}", kind_name.to_lowercase()), total, &[up, down])?;
    builder.fact(format!("{kind_name} up"), up);
    builder.fact(format!("{kind_name} down"), down);
    builder.finish()
}

struct GetAccessPoints;

#[async_trait]
impl ToolHandler for GetAccessPoints {
    fn name(&self) -> &'static str {
        "get_access_points"
    }

    fn description(&self) -> &'static str {
        "List access points with status, client count, and site"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(paging_fields())
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get("/monitoring/v2/aps", &paging_params(&args))
            .await?;
        let aps = data["aps"].as_array().cloned().unwrap_or_default();
        fleet_report(Label::Ap, "Access points", &aps)
    }
}

struct GetApDetails;

#[async_trait]
impl ToolHandler for GetApDetails {
    fn name(&self) -> &'static str {
        "get_ap_details"
    }

    fn description(&self) -> &'static str {
        "Show radios, clients, and resource usage for one access point"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("device_serial", "AP serial number").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        let data = ctx
            .api
            .get(&format!("/monitoring/v2/aps/{serial}"), &[])
            .await?;

        let clients = data["client_count"].as_u64().unwrap_or(0);
        let uptime = format::uptime(data["uptime"].as_u64().unwrap_or(0));
        let radios = data["radios"].as_array().cloned().unwrap_or_default();

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Ap,
            format!(
                "{serial}: {} at {}",
                data["name"].as_str().unwrap_or("unnamed"),
                data["site"].as_str().unwrap_or("unassigned"),
            ),
        );
        builder.line(
            Label::Stats,
            format!("{clients} clients, uptime {uptime}"),
        );
        builder.list(
            Label::Data,
            "Radios",
            radios
                .iter()
                .map(|r| {
                    format!(
                        "{} ch {} ({} clients)",
                        r["band"].as_str().unwrap_or("?"),
                        r["channel"].as_u64().unwrap_or(0),
                        r["client_count"].as_u64().unwrap_or(0),
                    )
                })
                .collect(),
        );

        builder.fact("Connected clients", clients);
        builder.fact("Uptime", &uptime);
        builder.finish()
    }
}

struct GetSwitches;

#[async_trait]
impl ToolHandler for GetSwitches {
    fn name(&self) -> &'static str {
        "get_switches"
    }

    fn description(&self) -> &'static str {
        "List switches with status, client count, and site"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(paging_fields())
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get("/monitoring/v1/switches", &paging_params(&args))
            .await?;
        let switches = data["switches"].as_array().cloned().unwrap_or_default();
        fleet_report(Label::Sw, "Switches", &switches)
    }
}

struct GetSwitchDetails;

#[async_trait]
impl ToolHandler for GetSwitchDetails {
    fn name(&self) -> &'static str {
        "get_switch_details"
    }

    fn description(&self) -> &'static str {
        "Show port usage and resource state for one switch"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("device_serial", "Switch serial number").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        let data = ctx
            .api
            .get(&format!("/monitoring/v1/switches/{serial}"), &[])
            .await?;

        let ports_up = data["ports_up"].as_u64().unwrap_or(0);
        let ports_down = data["ports_down"].as_u64().unwrap_or(0);
        let ports_total = ports_up + ports_down;
        let cpu = format::percent(data["cpu_utilization"].as_f64().unwrap_or(0.0));
        let uptime = format::uptime(data["uptime"].as_u64().unwrap_or(0));

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Sw,
            format!(
                "{serial}: {} at {}",
                data["name"].as_str().unwrap_or("unnamed"),
                data["site"].as_str().unwrap_or("unassigned"),
            ),
        );
        builder.line(
            Label::Stats,
            format!("Ports: {ports_total} total, {ports_up} up, {ports_down} down"),
        );
        builder.line(Label::Info, format!("CPU {cpu}, uptime {uptime}"));

        builder.fact_sum("Total ports", ports_total, &[ports_up, ports_down])?;
        builder.fact("Ports up", ports_up);
        builder.fact("CPU utilization", &cpu);
        builder.finish()
    }
}

struct GetGateways;

#[async_trait]
impl ToolHandler for GetGateways {
    fn name(&self) -> &'static str {
        "get_gateways"
    }

    fn description(&self) -> &'static str {
        "List gateways with status, client count, and site"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(paging_fields())
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get("/monitoring/v1/gateways", &paging_params(&args))
            .await?;
        let gateways = data["gateways"].as_array().cloned().unwrap_or_default();
        fleet_report(Label::Gw, "Gateways", &gateways)
    }
}

struct GetGatewayDetails;

#[async_trait]
impl ToolHandler for GetGatewayDetails {
    fn name(&self) -> &'static str {
        "get_gateway_details"
    }

    fn description(&self) -> &'static str {
        "Show tunnel and uplink state for one gateway"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("device_serial", "Gateway serial number").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = req_str(&args, "device_serial")?;
        let data = ctx
            .api
            .get(&format!("/monitoring/v1/gateways/{serial}"), &[])
            .await?;

        let tunnels_up = data["tunnels_up"].as_u64().unwrap_or(0);
        let tunnels_down = data["tunnels_down"].as_u64().unwrap_or(0);
        let uptime = format::uptime(data["uptime"].as_u64().unwrap_or(0));

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Gw,
            format!(
                "{serial}: {} at {}",
                data["name"].as_str().unwrap_or("unnamed"),
                data["site"].as_str().unwrap_or("unassigned"),
            ),
        );
        builder.line(
            Label::Vpn,
            format!("Tunnels: {tunnels_up} up, {tunnels_down} down"),
        );
        builder.line(Label::Info, format!("Uptime {uptime}"));

        builder.fact("Tunnels up", tunnels_up);
        builder.fact("Tunnels down", tunnels_down);
        builder.fact("Uptime", &uptime);
        builder.finish()
    }
}

struct GetConnectedClients;

#[async_trait]
impl ToolHandler for GetConnectedClients {
    fn name(&self) -> &'static str {
        "get_connected_clients"
    }

    fn description(&self) -> &'static str {
        "List connected clients, optionally filtered by site or connection type"
    }

    fn input_schema(&self) -> InputSchema {
        let mut fields = paging_fields();
        fields.push(
            Field::string("client_type", "Connection type filter").one_of(&["wireless", "wired"]),
        );
        InputSchema::new(fields)
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let mut params = paging_params(&args);
        params.push(("client_type", opt_str(&args, "client_type")));
        let data = ctx.api.get("/monitoring/v1/clients", &params).await?;

        let clients = data["clients"].as_array().cloned().unwrap_or_default();
        let total = clients.len() as u64;
        let wireless = clients
            .iter()
            .filter(|c| c["connection"].as_str() == Some("wireless"))
            .count() as u64;
        let wired = total - wireless;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Stats,
            format!("Connected clients: {total} ({wireless} wireless, {wired} wired)"),
        );
        builder.list(
            Label::Net,
            "Clients",
            clients
                .iter()
                .map(|c| {
                    format!(
                        "{} {} on {} at {}",
                        c["macaddr"].as_str().unwrap_or("?"),
                        c["hostname"].as_str().unwrap_or("unknown-host"),
                        c["network"].as_str().unwrap_or("?"),
                        c["site"].as_str().unwrap_or("unassigned"),
                    )
                })
                .collect(),
        );

        builder.fact_sum("Total clients", total, &[wireless, wired])?;
        builder.fact("Wireless clients", wireless);
        builder.fact("Wired clients", wired);
        builder.finish()
    }
}

struct GetClientDetails;

#[async_trait]
impl ToolHandler for GetClientDetails {
    fn name(&self) -> &'static str {
        "get_client_details"
    }

    fn description(&self) -> &'static str {
        "Show connection details and usage for one client by MAC address"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("macaddr", "Client MAC address").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let macaddr = req_str(&args, "macaddr")?;
        let data = ctx
            .api
            .get(&format!("/monitoring/v1/clients/{macaddr}"), &[])
            .await?;

        let rx = data["rx_data_bytes"].as_u64().unwrap_or(0);
        let tx = data["tx_data_bytes"].as_u64().unwrap_or(0);
        let rx_fmt = format::bytes(rx);
        let tx_fmt = format::bytes(tx);

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Net,
            format!(
                "{macaddr}: {} on {}",
                data["hostname"].as_str().unwrap_or("unknown-host"),
                data["network"].as_str().unwrap_or("?"),
            ),
        );
        builder.line(
            Label::Info,
            format!(
                "IP {}, associated to {} ({})",
                data["ip_address"].as_str().unwrap_or("?"),
                data["associated_device_name"].as_str().unwrap_or("?"),
                data["connection"].as_str().unwrap_or("?"),
            ),
        );
        builder.line(Label::Data, format!("Received {rx_fmt}, sent {tx_fmt}"));

        builder.fact("Bytes received", &rx_fmt);
        builder.fact("Bytes sent", &tx_fmt);
        builder.finish()
    }
}

struct GetSitesHealth;

#[async_trait]
impl ToolHandler for GetSitesHealth {
    fn name(&self) -> &'static str {
        "get_sites_health"
    }

    fn description(&self) -> &'static str {
        "Summarize device and uplink health across all sites"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::integer("limit", "Maximum sites to return")
            .default_value(100)
            .bounds(1, 1000)])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get(
                "/monitoring/v2/sites",
                &[("limit", opt_i64(&args, "limit").map(|v| v.to_string()))],
            )
            .await?;

        let sites = data["sites"].as_array().cloned().unwrap_or_default();
        let total = sites.len() as u64;
        let degraded = sites
            .iter()
            .filter(|s| s["device_down"].as_u64().unwrap_or(0) > 0)
            .count() as u64;
        let healthy = total - degraded;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Net,
            format!("Site health: {total} sites ({healthy} healthy, {degraded} degraded)"),
        );
        builder.list(
            Label::Health,
            "Sites",
            sites
                .iter()
                .map(|s| {
                    format!(
                        "{}: {} up / {} down, {} clients",
                        s["name"].as_str().unwrap_or("?"),
                        s["device_up"].as_u64().unwrap_or(0),
                        s["device_down"].as_u64().unwrap_or(0),
                        s["connected_count"].as_u64().unwrap_or(0),
                    )
                })
                .collect(),
        );

        builder.fact_sum("Total sites", total, &[healthy, degraded])?;
        builder.fact("Healthy sites", healthy);
        builder.fact("Degraded sites", degraded);
        builder.finish()
    }
}

struct GetSiteDetails;

#[async_trait]
impl ToolHandler for GetSiteDetails {
    fn name(&self) -> &'static str {
        "get_site_details"
    }

    fn description(&self) -> &'static str {
        "Show device breakdown and uplink state for one site"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("site", "Site name").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let site = req_str(&args, "site")?;
        let data = ctx
            .api
            .get("/monitoring/v1/sites", &[("site", Some(site.clone()))])
            .await?;

        let up = data["device_up"].as_u64().unwrap_or(0);
        let down = data["device_down"].as_u64().unwrap_or(0);
        let clients = data["connected_count"].as_u64().unwrap_or(0);
        let total = up + down;

        let mut builder = ReportBuilder::new();
        builder.line(Label::Net, format!("Site {site}: {total} devices"));
        builder.line(Label::Up, format!("Devices up: {up}"));
        builder.line(Label::Dn, format!("Devices down: {down}"));
        builder.line(Label::Stats, format!("Connected clients: {clients}"));

        builder.fact_sum("Total devices", total, &[up, down])?;
        builder.fact("Connected clients", clients);
        builder.finish()
    }
}

struct GetTopBandwidthClients;

#[async_trait]
impl ToolHandler for GetTopBandwidthClients {
    fn name(&self) -> &'static str {
        "get_top_bandwidth_clients"
    }

    fn description(&self) -> &'static str {
        "List the clients consuming the most bandwidth"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::integer("count", "Number of clients to return")
            .default_value(10)
            .bounds(1, 100)])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get(
                "/monitoring/v1/clients/bandwidth_usage/topn",
                &[("count", opt_i64(&args, "count").map(|v| v.to_string()))],
            )
            .await?;

        let clients = data["clients"].as_array().cloned().unwrap_or_default();
        let total_bytes: u64 = clients
            .iter()
            .map(|c| {
                c["rx_data_bytes"].as_u64().unwrap_or(0) + c["tx_data_bytes"].as_u64().unwrap_or(0)
            })
            .sum();
        let total_fmt = format::bytes(total_bytes);

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Trend,
            format!("Top {} clients by usage, {total_fmt} combined", clients.len()),
        );
        builder.list(
            Label::Data,
            "Heaviest clients",
            clients
                .iter()
                .map(|c| {
                    let used = c["rx_data_bytes"].as_u64().unwrap_or(0)
                        + c["tx_data_bytes"].as_u64().unwrap_or(0);
                    format!(
                        "{} ({}): {}",
                        c["hostname"].as_str().unwrap_or("unknown-host"),
                        c["macaddr"].as_str().unwrap_or("?"),
                        format::bytes(used),
                    )
                })
                .collect(),
        );

        builder.fact("Clients listed", clients.len());
        builder.fact("Combined usage", &total_fmt);
        builder.finish()
    }
}

struct GetNetworkUsageTrend;

#[async_trait]
impl ToolHandler for GetNetworkUsageTrend {
    fn name(&self) -> &'static str {
        "get_network_usage_trend"
    }

    fn description(&self) -> &'static str {
        "Show aggregate network throughput over a recent interval"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("site", "Restrict the trend to one site"),
            Field::integer("hours", "Lookback interval in hours")
                .default_value(3)
                .bounds(1, 24),
        ])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let hours = opt_i64(&args, "hours").unwrap_or(3);
        let data = ctx
            .api
            .get(
                "/monitoring/v2/networks/bandwidth_usage",
                &[
                    ("site", opt_str(&args, "site")),
                    ("interval", Some(format!("{hours}h"))),
                ],
            )
            .await?;

        let samples = data["samples"].as_array().cloned().unwrap_or_default();
        let rx: u64 = samples
            .iter()
            .map(|s| s["rx_data_bytes"].as_u64().unwrap_or(0))
            .sum();
        let tx: u64 = samples
            .iter()
            .map(|s| s["tx_data_bytes"].as_u64().unwrap_or(0))
            .sum();
        let rx_fmt = format::bytes(rx);
        let tx_fmt = format::bytes(tx);

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Trend,
            format!(
                "Network usage over {hours}h: received {rx_fmt}, sent {tx_fmt} ({} samples)",
                samples.len()
            ),
        );

        builder.fact("Bytes received", &rx_fmt);
        builder.fact("Bytes sent", &tx_fmt);
        builder.fact("Samples", samples.len());
        builder.finish()
    }
}
