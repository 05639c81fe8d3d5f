use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crimsonwatch_domain::WatchConfig;

pub const ENV_CONFIG_PATH: &str = "CRIMSONWATCH_CONFIG_PATH";

pub fn config_path() -> PathBuf {
    config_path_with(|key| env::var(key).ok())
}

/// Explicit env path, then `$HOME/.crimsonwatch/config.yaml`, then a local
/// `crimsonwatch.yaml`.
pub fn config_path_with<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_CONFIG_PATH) {
        return PathBuf::from(path);
    }

    if let Some(home) = lookup("HOME") {
        return Path::new(&home).join(".crimsonwatch").join("config.yaml");
    }

    PathBuf::from("crimsonwatch.yaml")
}

/// Load, apply environment overrides, and validate. `explicit` wins over
/// discovery.
pub fn load_config(explicit: Option<&Path>) -> Result<WatchConfig> {
    load_config_with(explicit, |key| env::var(key).ok())
}

pub fn load_config_with<F>(explicit: Option<&Path>, lookup: F) -> Result<WatchConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_path_with(&lookup),
    };
    let mut config = WatchConfig::load_from_path(&path)?;
    config
        .apply_env_overrides(&lookup)
        .context("invalid environment override")?;
    config
        .validate()
        .with_context(|| format!("invalid config (from {})", path.display()))
}
