//! Placeholder snapshots for when no live source answers.
//!
//! The shape is fixed: a quiet threat level, a five-agent roster covering
//! every agent status, and one alert per severity tier. Only the numbers
//! jitter.

use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};

use crimsonwatch_domain::{
    AgentRecord, AgentStatus, AlertRecord, AlertSeverity, EventRecord, MetricsSnapshot,
    SecuritySnapshot, ThreatLevel,
};

/// Threat levels a synthetic snapshot may report. Never critical.
pub const QUIET_BAND: RangeInclusive<u8> = 25..=44;

struct RosterEntry {
    name: &'static str,
    status: AgentStatus,
    tools: [&'static str; 2],
}

const ROSTER: [RosterEntry; 5] = [
    RosterEntry {
        name: "docs-reader-agent",
        status: AgentStatus::Active,
        tools: ["playwright_navigate", "playwright_screenshot"],
    },
    RosterEntry {
        name: "data-processor",
        status: AgentStatus::Warning,
        tools: ["file_read", "database_query"],
    },
    RosterEntry {
        name: "email-responder",
        status: AgentStatus::Active,
        tools: ["send_email", "read_inbox"],
    },
    RosterEntry {
        name: "code-assistant",
        status: AgentStatus::Active,
        tools: ["file_write", "execute_command"],
    },
    RosterEntry {
        name: "research-agent",
        status: AgentStatus::Blocked,
        tools: ["web_search", "file_download"],
    },
];

fn risk_band(status: AgentStatus) -> RangeInclusive<u32> {
    match status {
        AgentStatus::Active => 5..=30,
        AgentStatus::Warning => 41..=60,
        AgentStatus::Blocked => 71..=95,
    }
}

fn blocked_band(status: AgentStatus) -> RangeInclusive<u64> {
    match status {
        AgentStatus::Active => 0..=3,
        AgentStatus::Warning => 4..=10,
        AgentStatus::Blocked => 11..=20,
    }
}

pub struct Synthesizer {
    rng: Mutex<StdRng>,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic jitter, for reproducible tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn synthesize(&self, now: DateTime<Utc>) -> SecuritySnapshot {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let agents: Vec<AgentRecord> = ROSTER
            .iter()
            .enumerate()
            .map(|(index, entry)| AgentRecord {
                id: format!("agent-{}", index + 1),
                name: entry.name.to_string(),
                status: entry.status,
                risk_score: f64::from(rng.gen_range(risk_band(entry.status))),
                blocked_calls: rng.gen_range(blocked_band(entry.status)),
                last_activity: now - Duration::seconds(rng.gen_range(0..=300)),
                tools_used: entry.tools.iter().map(|tool| tool.to_string()).collect(),
            })
            .collect();

        let alerts = Self::alerts(&agents, now);

        let events = agents
            .iter()
            .enumerate()
            .map(|(index, agent)| {
                let mut details = Map::new();
                details.insert("tool".into(), Value::String(agent.tools_used[0].clone()));
                details.insert("synthetic".into(), json!(true));
                EventRecord {
                    id: format!("evt-{}", index + 1),
                    kind: "tool_usage".into(),
                    agent_id: agent.id.clone(),
                    details,
                    timestamp: agent.last_activity,
                }
            })
            .collect();

        let high_severity_alerts = alerts
            .iter()
            .filter(|alert| alert.severity.is_high() && !alert.acknowledged)
            .count() as u64;
        let metrics = MetricsSnapshot::new(
            now,
            ThreatLevel::new(rng.gen_range(QUIET_BAND)),
            rng.gen_range(0..50),
            rng.gen_range(150..250),
            high_severity_alerts,
        );

        SecuritySnapshot::new(metrics, agents, alerts, events, false)
    }

    fn alerts(agents: &[AgentRecord], now: DateTime<Utc>) -> Vec<AlertRecord> {
        let agent_id = |status: AgentStatus| {
            agents
                .iter()
                .find(|agent| agent.status == status)
                .map(|agent| agent.id.clone())
        };
        AlertSeverity::ALL
            .iter()
            .enumerate()
            .map(|(index, &severity)| {
                let (message, agent_id) = match severity {
                    AlertSeverity::Info => ("CrimsonWatch monitoring active".to_string(), None),
                    AlertSeverity::Low => (
                        "Tool call latency above baseline".to_string(),
                        agent_id(AgentStatus::Active),
                    ),
                    AlertSeverity::Med => (
                        "Unusual file access pattern detected".to_string(),
                        agent_id(AgentStatus::Warning),
                    ),
                    AlertSeverity::High => (
                        "Multiple blocked calls from research-agent".to_string(),
                        agent_id(AgentStatus::Blocked),
                    ),
                    AlertSeverity::Critical => (
                        "Permission violation attempt blocked".to_string(),
                        agent_id(AgentStatus::Blocked),
                    ),
                };
                AlertRecord {
                    id: format!("alert-{}", index + 1),
                    severity,
                    message,
                    agent_id,
                    timestamp: now,
                    acknowledged: severity == AlertSeverity::Info,
                }
            })
            .collect()
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}
