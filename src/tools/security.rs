//! Security tools: rogue AP detection and firewall session visibility.
//!
//! The firewall-sessions endpoint 400s on accounts without the matching
//! subscription scope. That is an upstream client error like any other: it
//! surfaces in the report and is never retried.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{Label, Report, ReportBuilder};

use super::schema::{opt_i64, opt_str, Field, InputSchema};
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the security tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetRogueAps));
    registry.register(Arc::new(GetFirewallSessions));
}

struct GetRogueAps;

#[async_trait]
impl ToolHandler for GetRogueAps {
    fn name(&self) -> &'static str {
        "get_rogue_aps"
    }

    fn description(&self) -> &'static str {
        "List detected rogue access points"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("site", "Filter by site name"),
            Field::integer("limit", "Maximum entries to return")
                .default_value(50)
                .bounds(1, 500),
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
                "/network-monitoring/v1/rogue_aps",
                &[
                    ("site", opt_str(&args, "site")),
                    ("limit", opt_i64(&args, "limit").map(|v| v.to_string())),
                ],
            )
            .await?;

        let rogues = data["rogue_aps"].as_array().cloned().unwrap_or_default();
        let total = rogues.len() as u64;
        let header_label = if total == 0 { Label::Ok } else { Label::Warn };

        let mut builder = ReportBuilder::new();
        builder.line(
            header_label,
            format!("Rogue access points detected: {total}"),
        );
        builder.list(
            Label::Sec,
            "Rogue APs",
            rogues
                .iter()
                .map(|r| {
                    format!(
                        "{} ssid '{}' signal {} dBm, last seen {}",
                        r["macaddr"].as_str().unwrap_or("?"),
                        r["ssid"].as_str().unwrap_or(""),
                        r["signal"].as_i64().unwrap_or(0),
                        r["last_seen"].as_str().unwrap_or("?"),
                    )
                })
                .collect(),
        );

        builder.fact("Rogue APs", total);
        builder.finish()
    }
}

struct GetFirewallSessions;

#[async_trait]
impl ToolHandler for GetFirewallSessions {
    fn name(&self) -> &'static str {
        "get_firewall_sessions"
    }

    fn description(&self) -> &'static str {
        "Show active firewall sessions on a gateway (requires security subscription)"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Field::string("device_serial", "Gateway serial number").required(),
            Field::integer("limit", "Maximum sessions to return")
                .default_value(50)
                .bounds(1, 500),
        ])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let serial = super::schema::req_str(&args, "device_serial")?;
        let data = ctx
            .api
            .get(
                "/network-monitoring/v1/firewall-sessions",
                &[
                    ("device_serial", Some(serial.clone())),
                    ("limit", opt_i64(&args, "limit").map(|v| v.to_string())),
                ],
            )
            .await?;

        let sessions = data["sessions"].as_array().cloned().unwrap_or_default();
        let total = sessions.len() as u64;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Sec,
            format!("Firewall sessions on {serial}: {total}"),
        );
        builder.list(
            Label::Net,
            "Sessions",
            sessions
                .iter()
                .map(|s| {
                    format!(
                        "{} {}:{} -> {}:{} ({})",
                        s["protocol"].as_str().unwrap_or("?"),
                        s["src_ip"].as_str().unwrap_or("?"),
                        s["src_port"].as_u64().unwrap_or(0),
                        s["dst_ip"].as_str().unwrap_or("?"),
                        s["dst_port"].as_u64().unwrap_or(0),
                        s["state"].as_str().unwrap_or("?"),
                    )
                })
                .collect(),
        );

        builder.fact("Active sessions", total);
        builder.finish()
    }
}
