//! Security state snapshot model.
//!
//! A [`SecuritySnapshot`] is built whole, once per cycle, and never edited
//! after construction. The constructor is the only place `active_agents` and
//! the threat status/color are decided.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::threat::{ThreatColor, ThreatLevel, ThreatStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Warning,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Info,
    Low,
    Med,
    High,
    Critical,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 5] = [
        AlertSeverity::Info,
        AlertSeverity::Low,
        AlertSeverity::Med,
        AlertSeverity::High,
        AlertSeverity::Critical,
    ];

    pub fn is_high(self) -> bool {
        matches!(self, AlertSeverity::High | AlertSeverity::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    #[serde(deserialize_with = "de::risk_score")]
    pub risk_score: f64,
    pub blocked_calls: u64,
    #[serde(deserialize_with = "de::timestamp")]
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub agent_id: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(deserialize_with = "de::timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Headline counters for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricsWire", into = "MetricsWire")]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    threat_level: ThreatLevel,
    pub blocked_calls_total: u64,
    active_agents: u64,
    pub total_events: u64,
    pub high_severity_alerts: u64,
}

impl MetricsSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        threat_level: ThreatLevel,
        blocked_calls_total: u64,
        total_events: u64,
        high_severity_alerts: u64,
    ) -> Self {
        Self {
            timestamp,
            threat_level,
            blocked_calls_total,
            active_agents: 0,
            total_events,
            high_severity_alerts,
        }
    }

    pub fn threat_level(&self) -> ThreatLevel {
        self.threat_level
    }

    pub fn threat_status(&self) -> ThreatStatus {
        self.threat_level.status()
    }

    pub fn threat_color(&self) -> ThreatColor {
        self.threat_level.color()
    }

    pub fn active_agents(&self) -> u64 {
        self.active_agents
    }
}

/// Serialized form. Status and color are written for consumers but ignored
/// on input, since they are recomputed from the level.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetricsWire {
    #[serde(deserialize_with = "de::timestamp")]
    timestamp: DateTime<Utc>,
    threat_level: f64,
    #[serde(default, skip_deserializing)]
    threat_status: Option<ThreatStatus>,
    #[serde(default, skip_deserializing)]
    threat_color: Option<ThreatColor>,
    #[serde(default)]
    blocked_calls_total: u64,
    #[serde(default)]
    active_agents: u64,
    #[serde(default)]
    total_events: u64,
    #[serde(default)]
    high_severity_alerts: u64,
}

impl From<MetricsWire> for MetricsSnapshot {
    fn from(wire: MetricsWire) -> Self {
        Self {
            timestamp: wire.timestamp,
            threat_level: ThreatLevel::from_reported(wire.threat_level),
            blocked_calls_total: wire.blocked_calls_total,
            active_agents: wire.active_agents,
            total_events: wire.total_events,
            high_severity_alerts: wire.high_severity_alerts,
        }
    }
}

impl From<MetricsSnapshot> for MetricsWire {
    fn from(metrics: MetricsSnapshot) -> Self {
        Self {
            timestamp: metrics.timestamp,
            threat_level: f64::from(metrics.threat_level.value()),
            threat_status: Some(metrics.threat_status()),
            threat_color: Some(metrics.threat_color()),
            blocked_calls_total: metrics.blocked_calls_total,
            active_agents: metrics.active_agents,
            total_events: metrics.total_events,
            high_severity_alerts: metrics.high_severity_alerts,
        }
    }
}

/// One complete, self-consistent view of the monitored security state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotWire")]
pub struct SecuritySnapshot {
    metrics: MetricsSnapshot,
    agents: Vec<AgentRecord>,
    alerts: Vec<AlertRecord>,
    events: Vec<EventRecord>,
    is_live: bool,
}

#[derive(Debug, Deserialize)]
struct SnapshotWire {
    metrics: MetricsSnapshot,
    #[serde(default)]
    agents: Vec<AgentRecord>,
    #[serde(default)]
    alerts: Vec<AlertRecord>,
    #[serde(default)]
    events: Vec<EventRecord>,
    #[serde(default)]
    is_live: bool,
}

impl From<SnapshotWire> for SecuritySnapshot {
    fn from(wire: SnapshotWire) -> Self {
        Self::new(wire.metrics, wire.agents, wire.alerts, wire.events, wire.is_live)
    }
}

impl SecuritySnapshot {
    pub fn new(
        mut metrics: MetricsSnapshot,
        agents: Vec<AgentRecord>,
        alerts: Vec<AlertRecord>,
        events: Vec<EventRecord>,
        is_live: bool,
    ) -> Self {
        metrics.active_agents = agents.len() as u64;
        Self {
            metrics,
            agents,
            alerts,
            events,
            is_live,
        }
    }

    /// Placeholder held by a store before its first publication.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self::new(
            MetricsSnapshot::new(timestamp, ThreatLevel::default(), 0, 0, 0),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            false,
        )
    }

    pub fn metrics(&self) -> &MetricsSnapshot {
        &self.metrics
    }

    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn alerts(&self) -> &[AlertRecord] {
        &self.alerts
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// Same content, re-flagged. Used when a live-looking document is served
    /// from a fallback dataset.
    pub fn with_live(mut self, is_live: bool) -> Self {
        self.is_live = is_live;
        self
    }

    /// Weak lookup: the referenced agent may no longer exist.
    pub fn agent(&self, id: &str) -> Option<&AgentRecord> {
        self.agents.iter().find(|agent| agent.id == id)
    }
}

mod de {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    /// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
    pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|err| D::Error::custom(format!("invalid timestamp {raw:?}: {err}")))
    }

    pub fn risk_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(D::Error::custom("risk_score must be finite"));
        }
        Ok(value.clamp(0.0, 100.0))
    }
}
