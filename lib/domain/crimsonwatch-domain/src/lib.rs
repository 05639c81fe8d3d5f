//! Domain models and invariants.

pub mod config;
pub mod error;
pub mod profile;
pub mod snapshot;
pub mod threat;

pub use config::{LogFormat, LoggingConfig, QueryCatalog, WatchConfig};
pub use error::ErrorKind;
pub use profile::FallbackProfile;
pub use snapshot::{
    AgentRecord, AgentStatus, AlertRecord, AlertSeverity, EventRecord, MetricsSnapshot,
    SecuritySnapshot,
};
pub use threat::{ThreatColor, ThreatCounters, ThreatLevel, ThreatStatus};
