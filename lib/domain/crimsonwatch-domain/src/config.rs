//! Service configuration.
//!
//! Loaded from YAML, then overridden from the environment. An absent base URL
//! disables that source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::profile::FallbackProfile;

pub const ENV_METRICS_URL: &str = "CRIMSONWATCH_METRICS_URL";
pub const ENV_BACKEND_URL: &str = "CRIMSONWATCH_BACKEND_URL";
pub const ENV_GATEWAY_URL: &str = "CRIMSONWATCH_GATEWAY_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "CRIMSONWATCH_POLL_INTERVAL_MS";
pub const ENV_FALLBACK_PROFILE: &str = "CRIMSONWATCH_FALLBACK_PROFILE";

const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub metrics_base: Option<String>,
    pub backend_base: Option<String>,
    pub gateway_base: Option<String>,
    pub poll_interval_ms: u64,
    pub source_timeout_ms: u64,
    pub fallback_profile: Option<FallbackProfile>,
    /// Directory holding `{profile}.json` overrides for the bundled datasets.
    pub fallback_dir: Option<PathBuf>,
    pub queries: QueryCatalog,
    pub logging: LoggingConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            metrics_base: Some("http://localhost:9090".into()),
            backend_base: Some("http://localhost:5000".into()),
            gateway_base: Some("http://localhost:9000".into()),
            poll_interval_ms: 5_000,
            source_timeout_ms: 4_000,
            fallback_profile: None,
            fallback_dir: None,
            queries: QueryCatalog::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Query expression per logical counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCatalog {
    pub threat_level: String,
    pub blocked_calls: String,
    pub tool_calls: String,
    pub total_events: String,
    pub active_alerts: String,
    pub agent_risk: String,
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self {
            threat_level: "crimsonwatch_threat_level".into(),
            blocked_calls: "crimsonwatch_blocked_calls_total".into(),
            tool_calls: "crimsonwatch_tool_calls_total".into(),
            total_events: "crimsonwatch_events_total".into(),
            active_alerts: "crimsonwatch_active_alerts".into(),
            agent_risk: "crimsonwatch_agent_risk_score".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl WatchConfig {
    /// Load from a YAML file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. An empty URL disables the
    /// corresponding source.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_METRICS_URL) {
            self.metrics_base = non_empty(url);
        }
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_base = non_empty(url);
        }
        if let Some(url) = lookup(ENV_GATEWAY_URL) {
            self.gateway_base = non_empty(url);
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL_MS} must be an integer, got {raw:?}"))?;
        }
        if let Some(raw) = lookup(ENV_FALLBACK_PROFILE) {
            self.fallback_profile = match non_empty(raw) {
                Some(name) => Some(name.parse()?),
                None => None,
            };
        }
        Ok(())
    }

    /// Check bounds and trim trailing slashes from base URLs.
    pub fn validate(mut self) -> Result<Self> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            bail!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            );
        }
        if self.source_timeout_ms == 0 {
            bail!("source_timeout_ms must be positive");
        }
        for (name, base) in [
            ("metrics_base", &mut self.metrics_base),
            ("backend_base", &mut self.backend_base),
            ("gateway_base", &mut self.gateway_base),
        ] {
            if let Some(url) = base {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    bail!("{name} must be an http(s) URL, got {url:?}");
                }
                let trimmed = url.trim_end_matches('/').len();
                url.truncate(trimmed);
            }
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WatchConfig::load_from_path(&dir.path().join("absent.yaml")).expect("load");
        assert_eq!(config, WatchConfig::default());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "metrics_base: http://prom:9090/\nbackend_base: null\npoll_interval_ms: 2500\nfallback_profile: attack\nlogging:\n  format: json"
        )
        .expect("write");

        let config = WatchConfig::load_from_path(file.path())
            .expect("load")
            .validate()
            .expect("valid");
        assert_eq!(config.metrics_base.as_deref(), Some("http://prom:9090"));
        assert_eq!(config.backend_base, None);
        assert_eq!(config.poll_interval(), Duration::from_millis(2500));
        assert_eq!(config.fallback_profile, Some(FallbackProfile::Attack));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.queries, QueryCatalog::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_METRICS_URL, "http://metrics:9090"),
            (ENV_BACKEND_URL, ""),
            (ENV_POLL_INTERVAL_MS, "3000"),
            (ENV_FALLBACK_PROFILE, "normal"),
        ]);
        let mut config = WatchConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|value| value.to_string()))
            .expect("overrides");
        assert_eq!(config.metrics_base.as_deref(), Some("http://metrics:9090"));
        assert_eq!(config.backend_base, None);
        assert_eq!(config.poll_interval_ms, 3000);
        assert_eq!(config.fallback_profile, Some(FallbackProfile::Normal));
    }

    #[test]
    fn test_env_override_rejects_bad_values() {
        let mut config = WatchConfig::default();
        assert!(
            config
                .apply_env_overrides(|key| (key == ENV_POLL_INTERVAL_MS).then(|| "soon".into()))
                .is_err()
        );
        assert!(
            config
                .apply_env_overrides(|key| (key == ENV_FALLBACK_PROFILE).then(|| "chaos".into()))
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let config = WatchConfig {
            poll_interval_ms: 10,
            ..WatchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = WatchConfig {
            backend_base: Some("localhost:5000".into()),
            ..WatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
