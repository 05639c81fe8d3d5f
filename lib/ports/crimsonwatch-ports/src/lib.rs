//! Source ports and the payloads they produce.
//!
//! Every source is reached through [`SourceClient`]. A client never lets a
//! failure escape as a panic or an untyped error: it returns a tagged
//! [`SourceError`] that the merge step downgrades into a precedence choice.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crimsonwatch_domain::{AgentRecord, AlertRecord, ErrorKind, FallbackProfile, SecuritySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Metrics,
    Metadata,
    Fallback,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Metrics => "metrics",
            SourceKind::Metadata => "metadata",
            SourceKind::Fallback => "fallback",
        })
    }
}

/// Per-cycle inputs handed to every source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub started_at: DateTime<Utc>,
    pub fallback_profile: Option<FallbackProfile>,
}

impl FetchRequest {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            fallback_profile: None,
        }
    }

    pub fn with_fallback_profile(mut self, profile: Option<FallbackProfile>) -> Self {
        self.fallback_profile = profile;
        self
    }
}

/// One per-agent risk series from the metrics backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRiskSample {
    pub agent_id: Option<String>,
    pub risk_score: f64,
}

/// Counters read from the metrics backend. `None` means the query had no data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsPayload {
    pub threat_level: Option<f64>,
    pub blocked_calls_total: Option<u64>,
    pub tool_calls_total: Option<u64>,
    pub total_events: Option<u64>,
    pub high_severity_alerts: Option<u64>,
    pub agent_risk: Vec<AgentRiskSample>,
}

impl MetricsPayload {
    pub fn has_data(&self) -> bool {
        self.has_threat_figures() || !self.agent_risk.is_empty()
    }

    pub fn has_threat_figures(&self) -> bool {
        self.threat_level.is_some()
            || self.blocked_calls_total.is_some()
            || self.tool_calls_total.is_some()
            || self.total_events.is_some()
            || self.high_severity_alerts.is_some()
    }
}

/// Slices read from the metadata backend. `None` means absent or rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPayload {
    pub agents: Option<Vec<AgentRecord>>,
    pub alerts: Option<Vec<AlertRecord>>,
}

impl MetadataPayload {
    pub fn has_data(&self) -> bool {
        self.agents.as_ref().is_some_and(|agents| !agents.is_empty())
            || self.alerts.as_ref().is_some_and(|alerts| !alerts.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Metrics(MetricsPayload),
    Metadata(MetadataPayload),
    Fallback(Box<SecuritySnapshot>),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("{origin} source unreachable: {reason}")]
    Unreachable { origin: SourceKind, reason: String },
    #[error("{origin} source timed out after {after:?}")]
    Timeout { origin: SourceKind, after: Duration },
    #[error("{origin} source returned a malformed response: {reason}")]
    Malformed { origin: SourceKind, reason: String },
    #[error("{origin} source is disabled")]
    Disabled { origin: SourceKind },
}

impl SourceError {
    pub fn origin(&self) -> SourceKind {
        match self {
            SourceError::Unreachable { origin, .. }
            | SourceError::Timeout { origin, .. }
            | SourceError::Malformed { origin, .. }
            | SourceError::Disabled { origin } => *origin,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Malformed { .. } => ErrorKind::SourceMalformed,
            SourceError::Unreachable { .. }
            | SourceError::Timeout { .. }
            | SourceError::Disabled { .. } => ErrorKind::SourceUnreachable,
        }
    }
}

pub type SourceResult = Result<RawPayload, SourceError>;

#[async_trait]
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, request: &FetchRequest) -> SourceResult;
}

/// The three sources one cycle queries.
#[derive(Clone)]
pub struct SourceSet {
    pub metrics: Arc<dyn SourceClient>,
    pub metadata: Arc<dyn SourceClient>,
    pub fallback: Arc<dyn SourceClient>,
}

impl SourceSet {
    pub fn empty() -> Self {
        Self {
            metrics: Arc::new(NullSource(SourceKind::Metrics)),
            metadata: Arc::new(NullSource(SourceKind::Metadata)),
            fallback: Arc::new(NullSource(SourceKind::Fallback)),
        }
    }

    pub fn with_metrics(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.metrics = client;
        self
    }

    pub fn with_metadata(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.metadata = client;
        self
    }

    pub fn with_fallback(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.fallback = client;
        self
    }
}

impl Default for SourceSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Stands in for a source that is not configured.
#[derive(Debug, Clone, Copy)]
pub struct NullSource(pub SourceKind);

#[async_trait]
impl SourceClient for NullSource {
    fn kind(&self) -> SourceKind {
        self.0
    }

    async fn fetch(&self, _request: &FetchRequest) -> SourceResult {
        Err(SourceError::Disabled { origin: self.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_set_reports_disabled_sources() {
        let set = SourceSet::empty();
        let request = FetchRequest::new(Utc::now());
        for (client, kind) in [
            (&set.metrics, SourceKind::Metrics),
            (&set.metadata, SourceKind::Metadata),
            (&set.fallback, SourceKind::Fallback),
        ] {
            let err = client.fetch(&request).await.expect_err("disabled");
            assert_eq!(err, SourceError::Disabled { origin: kind });
            assert_eq!(err.kind(), ErrorKind::SourceUnreachable);
        }
    }

    #[test]
    fn test_metrics_payload_has_data() {
        assert!(!MetricsPayload::default().has_data());
        let payload = MetricsPayload {
            agent_risk: vec![AgentRiskSample {
                agent_id: None,
                risk_score: 3.0,
            }],
            ..MetricsPayload::default()
        };
        assert!(payload.has_data());
        assert!(!payload.has_threat_figures());
    }

    #[test]
    fn test_metadata_payload_empty_slices_are_not_data() {
        let payload = MetadataPayload {
            agents: Some(Vec::new()),
            alerts: Some(Vec::new()),
        };
        assert!(!payload.has_data());
    }

    #[test]
    fn test_error_kinds() {
        let malformed = SourceError::Malformed {
            origin: SourceKind::Metadata,
            reason: "not an array".into(),
        };
        assert_eq!(malformed.kind(), ErrorKind::SourceMalformed);
        assert_eq!(malformed.origin(), SourceKind::Metadata);
        let timeout = SourceError::Timeout {
            origin: SourceKind::Metrics,
            after: Duration::from_secs(4),
        };
        assert_eq!(timeout.kind(), ErrorKind::SourceUnreachable);
    }
}
