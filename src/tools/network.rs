//! Network service tools (`/network-services/...`, WLAN and uplink state).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{format, Label, Report, ReportBuilder};

use super::schema::{opt_str, req_str, Field, InputSchema};
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the network service tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetWlans));
    registry.register(Arc::new(GetWlanDetails));
    registry.register(Arc::new(GetVpnTunnels));
    registry.register(Arc::new(GetUplinkStatus));
}

struct GetWlans;

#[async_trait]
impl ToolHandler for GetWlans {
    fn name(&self) -> &'static str {
        "get_wlans"
    }

    fn description(&self) -> &'static str {
        "List configured WLANs with security mode and client count"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::empty()
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx.api.get("/monitoring/v2/wlans", &[]).await?;

        let wlans = data["wlans"].as_array().cloned().unwrap_or_default();
        let total = wlans.len() as u64;
        let enabled = wlans
            .iter()
            .filter(|w| w["enabled"].as_bool().unwrap_or(false))
            .count() as u64;
        let disabled = total - enabled;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Net,
            format!("WLANs: {total} configured ({enabled} enabled, {disabled} disabled)"),
        );
        builder.list(
            Label::Data,
            "Networks",
            wlans
                .iter()
                .map(|w| {
                    format!(
                        "{} [{}] {} clients{}",
                        w["essid"].as_str().unwrap_or("?"),
                        w["security"].as_str().unwrap_or("unknown"),
                        w["client_count"].as_u64().unwrap_or(0),
                        if w["enabled"].as_bool().unwrap_or(false) {
                            ""
                        } else {
                            " (disabled)"
                        },
                    )
                })
                .collect(),
        );

        builder.fact_sum("Total WLANs", total, &[enabled, disabled])?;
        builder.fact("Enabled WLANs", enabled);
        builder.finish()
    }
}

struct GetWlanDetails;

#[async_trait]
impl ToolHandler for GetWlanDetails {
    fn name(&self) -> &'static str {
        "get_wlan_details"
    }

    fn description(&self) -> &'static str {
        "Show configuration and usage for one WLAN by ESSID"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("essid", "ESSID of the WLAN").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let essid = req_str(&args, "essid")?;
        let data = ctx
            .api
            .get(&format!("/monitoring/v2/wlans/{essid}"), &[])
            .await?;

        let clients = data["client_count"].as_u64().unwrap_or(0);

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Net,
            format!(
                "WLAN {essid}: {} ({})",
                data["security"].as_str().unwrap_or("unknown security"),
                if data["enabled"].as_bool().unwrap_or(false) {
                    "enabled"
                } else {
                    "disabled"
                },
            ),
        );
        builder.line(
            Label::Info,
            format!(
                "VLAN {}, band {}",
                data["vlan"].as_u64().unwrap_or(0),
                data["band"].as_str().unwrap_or("all"),
            ),
        );
        builder.line(Label::Stats, format!("Connected clients: {clients}"));

        builder.fact("Connected clients", clients);
        builder.finish()
    }
}

struct GetVpnTunnels;

#[async_trait]
impl ToolHandler for GetVpnTunnels {
    fn name(&self) -> &'static str {
        "get_vpn_tunnels"
    }

    fn description(&self) -> &'static str {
        "List VPN tunnels with peer and status"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("site", "Filter by site name")])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get(
                "/network-services/v1/vpn/tunnels",
                &[("site", opt_str(&args, "site"))],
            )
            .await?;

        let tunnels = data["tunnels"].as_array().cloned().unwrap_or_default();
        let total = tunnels.len() as u64;
        let up = tunnels
            .iter()
            .filter(|t| t["status"].as_str().is_some_and(|s| s.eq_ignore_ascii_case("up")))
            .count() as u64;
        let down = total - up;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Vpn,
            format!("VPN tunnels: {total} total ({up} up, {down} down)"),
        );
        builder.list(
            Label::Vpn,
            "Tunnels",
            tunnels
                .iter()
                .map(|t| {
                    format!(
                        "{} {} -> {} (up {})",
                        t["status"].as_str().unwrap_or("?"),
                        t["name"].as_str().unwrap_or("?"),
                        t["peer"].as_str().unwrap_or("?"),
                        format::uptime(t["uptime"].as_u64().unwrap_or(0)),
                    )
                })
                .collect(),
        );

        builder.fact_sum("Total tunnels", total, &[up, down])?;
        builder.fact("Tunnels up", up);
        builder.fact("Tunnels down", down);
        builder.finish()
    }
}

struct GetUplinkStatus;

#[async_trait]
impl ToolHandler for GetUplinkStatus {
    fn name(&self) -> &'static str {
        "get_uplink_status"
    }

    fn description(&self) -> &'static str {
        "Show WAN uplink state across gateways"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("site", "Filter by site name")])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx
            .api
            .get(
                "/network-monitoring/v1/uplinks",
                &[("site", opt_str(&args, "site"))],
            )
            .await?;

        let uplinks = data["uplinks"].as_array().cloned().unwrap_or_default();
        let total = uplinks.len() as u64;
        let up = uplinks
            .iter()
            .filter(|u| u["status"].as_str().is_some_and(|s| s.eq_ignore_ascii_case("up")))
            .count() as u64;
        let down = total - up;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Net,
            format!("WAN uplinks: {total} total ({up} up, {down} down)"),
        );
        builder.list(
            Label::Gw,
            "Uplinks",
            uplinks
                .iter()
                .map(|u| {
                    format!(
                        "{} {} via {} ({})",
                        u["status"].as_str().unwrap_or("?"),
                        u["gateway"].as_str().unwrap_or("?"),
                        u["carrier"].as_str().unwrap_or("unknown carrier"),
                        u["wan_type"].as_str().unwrap_or("?"),
                    )
                })
                .collect(),
        );

        builder.fact_sum("Total uplinks", total, &[up, down])?;
        builder.fact("Uplinks up", up);
        builder.fact("Uplinks down", down);
        builder.finish()
    }
}
