//! Per-field-group merge of one cycle's source results.

use std::cell::OnceCell;

use chrono::{DateTime, Utc};

use crimsonwatch_domain::{
    AgentRecord, AgentStatus, AlertRecord, MetricsSnapshot, SecuritySnapshot, ThreatCounters,
    ThreatLevel,
};
use crimsonwatch_ports::{
    AgentRiskSample, MetadataPayload, MetricsPayload, RawPayload, SourceError, SourceResult,
};

use crate::synthesizer::Synthesizer;

/// Derived agents above this risk are flagged `warning`.
pub const DERIVED_WARNING_RISK: f64 = 50.0;

pub struct Merger {
    synthesizer: Synthesizer,
}

impl Merger {
    pub fn new(synthesizer: Synthesizer) -> Self {
        Self { synthesizer }
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Combine one cycle's results. Agents, alerts and threat figures each
    /// take the highest-precedence source that has data for them.
    pub fn merge(
        &self,
        metrics: SourceResult,
        metadata: SourceResult,
        fallback: SourceResult,
        now: DateTime<Utc>,
    ) -> SecuritySnapshot {
        let metrics = metrics_payload(metrics).filter(MetricsPayload::has_data);
        let metadata = metadata_payload(metadata).unwrap_or_default();

        if metrics.is_none() && !metadata.has_data() {
            return match fallback {
                Ok(RawPayload::Fallback(snapshot)) => {
                    tracing::info!(source = "fallback", "no live data, serving static profile");
                    snapshot.with_live(false)
                }
                other => {
                    if let Err(err) = &other {
                        if !matches!(err, SourceError::Disabled { .. }) {
                            tracing::warn!(source = "fallback", error = %err, "static fallback failed");
                        }
                    }
                    tracing::info!("no live data, synthesizing snapshot");
                    self.synthesizer.synthesize(now)
                }
            };
        }

        let cell = OnceCell::new();
        let synthetic = || cell.get_or_init(|| self.synthesizer.synthesize(now));

        let agents = match metadata.agents {
            Some(agents) if !agents.is_empty() => agents,
            _ => match &metrics {
                Some(payload) if !payload.agent_risk.is_empty() => {
                    derive_agents(&payload.agent_risk, now)
                }
                _ => synthetic().agents().to_vec(),
            },
        };
        let alerts = match metadata.alerts {
            Some(alerts) => alerts,
            None => synthetic().alerts().to_vec(),
        };

        let figures = match &metrics {
            Some(payload) => reported_figures(payload, now),
            None => derived_figures(&agents, &alerts, now),
        };

        SecuritySnapshot::new(figures, agents, alerts, Vec::new(), true)
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(Synthesizer::new())
    }
}

fn metrics_payload(result: SourceResult) -> Option<MetricsPayload> {
    match result {
        Ok(RawPayload::Metrics(payload)) => Some(payload),
        Ok(other) => {
            tracing::warn!(source = "metrics", payload = ?other, "unexpected payload shape");
            None
        }
        Err(err) => {
            log_degraded(&err);
            None
        }
    }
}

fn metadata_payload(result: SourceResult) -> Option<MetadataPayload> {
    match result {
        Ok(RawPayload::Metadata(payload)) => Some(payload),
        Ok(other) => {
            tracing::warn!(source = "metadata", payload = ?other, "unexpected payload shape");
            None
        }
        Err(err) => {
            log_degraded(&err);
            None
        }
    }
}

fn log_degraded(err: &SourceError) {
    match err {
        SourceError::Disabled { .. } => {}
        _ => tracing::warn!(source = %err.origin(), error = %err, "source degraded"),
    }
}

/// Reduced-fidelity agents from per-agent risk series.
pub fn derive_agents(samples: &[AgentRiskSample], now: DateTime<Utc>) -> Vec<AgentRecord> {
    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let risk_score = sample.risk_score.clamp(0.0, 100.0);
            AgentRecord {
                id: sample
                    .agent_id
                    .clone()
                    .unwrap_or_else(|| format!("agent-{index}")),
                name: sample
                    .agent_id
                    .clone()
                    .unwrap_or_else(|| "Unknown Agent".to_string()),
                status: if risk_score > DERIVED_WARNING_RISK {
                    AgentStatus::Warning
                } else {
                    AgentStatus::Active
                },
                risk_score,
                blocked_calls: 0,
                last_activity: now,
                tools_used: Vec::new(),
            }
        })
        .collect()
}

fn reported_figures(payload: &MetricsPayload, now: DateTime<Utc>) -> MetricsSnapshot {
    let blocked = payload.blocked_calls_total.unwrap_or(0);
    let threat_level = match payload.threat_level {
        Some(reported) => ThreatLevel::from_reported(reported),
        None => ThreatLevel::from_counters(ThreatCounters {
            blocked_calls_total: blocked,
            total_tool_calls: payload.tool_calls_total,
        }),
    };
    MetricsSnapshot::new(
        now,
        threat_level,
        blocked,
        payload.total_events.unwrap_or(0),
        payload.high_severity_alerts.unwrap_or(0),
    )
}

fn derived_figures(agents: &[AgentRecord], alerts: &[AlertRecord], now: DateTime<Utc>) -> MetricsSnapshot {
    let blocked = agents.iter().map(|agent| agent.blocked_calls).sum();
    let high = alerts
        .iter()
        .filter(|alert| alert.severity.is_high() && !alert.acknowledged)
        .count() as u64;
    MetricsSnapshot::new(
        now,
        ThreatLevel::from_counters(ThreatCounters {
            blocked_calls_total: blocked,
            total_tool_calls: None,
        }),
        blocked,
        0,
        high,
    )
}
