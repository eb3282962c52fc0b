//! Configuration tools (`/configuration/...`): groups, templates, and
//! per-device sync status.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{Label, Report, ReportBuilder};

use super::schema::{req_str, Field, InputSchema};
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the configuration tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetGroupList));
    registry.register(Arc::new(GetTemplates));
    registry.register(Arc::new(GetDeviceConfigStatus));
}

struct GetGroupList;

#[async_trait]
impl ToolHandler for GetGroupList {
    fn name(&self) -> &'static str {
        "get_group_list"
    }

    fn description(&self) -> &'static str {
        "List configuration groups"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::empty()
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let data = ctx.api.get("/configuration/v2/groups", &[]).await?;

        let groups: Vec<String> = data["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|g| g.as_str().map(str::to_string))
            .collect();
        let total = groups.len() as u64;

        let mut builder = ReportBuilder::new();
        builder.line(Label::Stats, format!("Configuration groups: {total}"));
        builder.list(Label::Data, "Groups", groups);

        builder.fact("Total groups", total);
        builder.finish()
    }
}

struct GetTemplates;

#[async_trait]
impl ToolHandler for GetTemplates {
    fn name(&self) -> &'static str {
        "get_templates"
    }

    fn description(&self) -> &'static str {
        "List configuration templates in a group"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Field::string("group", "Configuration group name").required()])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let group = req_str(&args, "group")?;
        let data = ctx
            .api
            .get(&format!("/configuration/v1/groups/{group}/templates"), &[])
            .await?;

        let templates = data["data"].as_array().cloned().unwrap_or_default();
        let total = templates.len() as u64;

        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Stats,
            format!("Templates in group {group}: {total}"),
        );
        builder.list(
            Label::Data,
            "Templates",
            templates
                .iter()
                .map(|t| {
                    format!(
                        "{} ({}, version {})",
                        t["name"].as_str().unwrap_or("?"),
                        t["device_type"].as_str().unwrap_or("?"),
                        t["version"].as_str().unwrap_or("?"),
                    )
                })
                .collect(),
        );

        builder.fact("Total templates", total);
        builder.finish()
    }
}

struct GetDeviceConfigStatus;

#[async_trait]
impl ToolHandler for GetDeviceConfigStatus {
    fn name(&self) -> &'static str {
        "get_device_config_status"
    }

    fn description(&self) -> &'static str {
        "Show configuration sync state for one device"
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
            .get(
                &format!("/configuration/v1/devices/{serial}/config_details"),
                &[],
            )
            .await?;

        let synced = data["device_synced"].as_bool().unwrap_or(false);
        let label = if synced { Label::Ok } else { Label::Warn };

        let mut builder = ReportBuilder::new();
        builder.line(
            label,
            format!(
                "{serial}: configuration {}",
                if synced { "in sync" } else { "out of sync" }
            ),
        );
        builder.line(
            Label::Info,
            format!(
                "Group {}, last sync {}",
                data["group"].as_str().unwrap_or("?"),
                data["last_sync_time"].as_str().unwrap_or("never"),
            ),
        );
        builder.finish()
    }
}
