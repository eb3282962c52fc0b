//! The `check_server_health` pseudo-tool.
//!
//! Synthesizes a report from subsystem state the gateway already holds,
//! plus exactly one lightweight GET to the vendor API to confirm
//! reachability. No other I/O: the probe must stay cheap enough to call
//! from a liveness check.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::report::{format, Label, Report, ReportBuilder};
use crate::resilience::CircuitState;

use super::schema::InputSchema;
use super::{ToolContext, ToolHandler, ToolRegistry};

/// Registers the health probe.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(CheckServerHealth));
}

/// Component verdicts, ordered so the worst wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verdict {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Verdict {
    fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    fn label(self) -> Label {
        match self {
            Self::Healthy => Label::Ok,
            Self::Degraded => Label::Warn,
            Self::Unhealthy => Label::Crit,
        }
    }
}

struct CheckServerHealth;

#[async_trait]
impl ToolHandler for CheckServerHealth {
    fn name(&self) -> &'static str {
        "check_server_health"
    }

    fn description(&self) -> &'static str {
        "Report gateway subsystem health: auth, circuit breaker, rate limiter, vendor reachability"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::empty()
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _args: Map<String, Value>,
    ) -> GatewayResult<Report> {
        let token = ctx.api.tokens().status().await;
        let auth_verdict = if token.present {
            Verdict::Healthy
        } else {
            // No token yet; the first real call will acquire one.
            Verdict::Degraded
        };

        let breaker_state = ctx.api.breaker().state();
        let failures = ctx.api.breaker().failure_count();
        let breaker_verdict = match breaker_state {
            CircuitState::Closed => Verdict::Healthy,
            CircuitState::HalfOpen => Verdict::Degraded,
            CircuitState::Open => Verdict::Unhealthy,
        };

        let tokens_available = ctx.api.limiter().available();
        let utilization = ctx.api.limiter().utilization() * 100.0;
        let limiter_verdict = if utilization < 90.0 {
            Verdict::Healthy
        } else {
            Verdict::Degraded
        };

        let (reach_verdict, reach_text) = match ctx.api.probe_reachability().await {
            Ok(status) if (200..300).contains(&status) => {
                (Verdict::Healthy, format!("reachable (HTTP {status})"))
            }
            Ok(status) if (400..500).contains(&status) => {
                (Verdict::Degraded, format!("reachable but returned HTTP {status}"))
            }
            Ok(status) => (Verdict::Unhealthy, format!("returned HTTP {status}")),
            Err(err) => (Verdict::Unhealthy, format!("unreachable: {err}")),
        };

        let overall = auth_verdict
            .max(breaker_verdict)
            .max(limiter_verdict)
            .max(reach_verdict);

        let utilization_fmt = format::percent(utilization);
        let mut builder = ReportBuilder::new();
        builder.line(
            Label::Health,
            format!("Gateway health: {}", overall.as_str()),
        );
        builder.line(
            auth_verdict.label(),
            if token.present {
                format!(
                    "Auth: token held, expires in {}",
                    format::uptime(token.expires_in_secs)
                )
            } else {
                "Auth: no token yet (acquired on first call)".to_string()
            },
        );
        builder.line(
            breaker_verdict.label(),
            format!(
                "Circuit breaker: {} ({failures} consecutive failures)",
                breaker_state.as_str()
            ),
        );
        builder.line(
            limiter_verdict.label(),
            format!(
                "Rate limiter: {tokens_available} tokens available, {utilization_fmt} utilized"
            ),
        );
        builder.line(reach_verdict.label(), format!("Vendor API: {reach_text}"));

        builder.fact("Overall", overall.as_str());
        builder.fact("Breaker failures", failures);
        builder.fact("Limiter tokens", tokens_available);
        builder.fact("Limiter utilization", &utilization_fmt);
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_ordering_picks_worst() {
        assert_eq!(Verdict::Healthy.max(Verdict::Degraded), Verdict::Degraded);
        assert_eq!(Verdict::Degraded.max(Verdict::Unhealthy), Verdict::Unhealthy);
        assert_eq!(Verdict::Healthy.max(Verdict::Healthy), Verdict::Healthy);
    }
}
