use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crimsonwatch_adapter_sources::{MetadataClient, MetricsQueryClient, StaticFallbackClient};
use crimsonwatch_application::{PollScheduler, SchedulerConfig, SnapshotStore};
use crimsonwatch_domain::WatchConfig;
use crimsonwatch_ports::SourceSet;

/// Build the source set. A source without a base URL stays a null source.
pub fn build_sources(config: &WatchConfig) -> Result<SourceSet> {
    let timeout = config.source_timeout();
    let mut sources = SourceSet::empty();

    if let Some(base) = &config.metrics_base {
        let client = MetricsQueryClient::new(base.clone(), config.queries.clone(), timeout)
            .context("failed to build metrics client")?;
        sources = sources.with_metrics(Arc::new(client));
    } else {
        tracing::info!(source = "metrics", "no base URL, source disabled");
    }

    if let Some(base) = &config.backend_base {
        let client =
            MetadataClient::new(base.clone(), timeout).context("failed to build metadata client")?;
        sources = sources.with_metadata(Arc::new(client));
    } else {
        tracing::info!(source = "metadata", "no base URL, source disabled");
    }

    let fallback = match &config.fallback_dir {
        Some(dir) => StaticFallbackClient::with_dir(dir),
        None => StaticFallbackClient::new(),
    };
    Ok(sources.with_fallback(Arc::new(fallback)))
}

pub struct Service {
    pub store: SnapshotStore,
    pub scheduler: Arc<PollScheduler>,
}

/// Wire store and scheduler. `interval` overrides the configured cadence.
pub fn build_service(config: &WatchConfig, interval: Option<Duration>) -> Result<Service> {
    let sources = build_sources(config)?;
    let store = SnapshotStore::with_profile(config.fallback_profile);
    let mut scheduler_config = SchedulerConfig::from_config(config);
    if let Some(interval) = interval {
        scheduler_config = scheduler_config.with_interval(interval);
    }
    let scheduler = Arc::new(PollScheduler::new(sources, store.clone(), scheduler_config));
    Ok(Service { store, scheduler })
}
