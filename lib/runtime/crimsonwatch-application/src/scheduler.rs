//! Polling scheduler.
//!
//! A cycle is `Idle -> Polling -> Idle`: fetch every source concurrently,
//! wait for all of them, merge, publish. At most one cycle is in flight;
//! triggers that arrive meanwhile are counted and dropped. After teardown
//! nothing is published, including the result of a cycle already running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crimsonwatch_domain::{ErrorKind, WatchConfig};
use crimsonwatch_ports::{FetchRequest, SourceClient, SourceError, SourceResult, SourceSet};

use crate::merger::Merger;
use crate::store::SnapshotStore;

/// Cadence of the fast threat-summary variant.
pub const FAST_INTERVAL: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub source_timeout: Duration,
}

impl SchedulerConfig {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            source_timeout: config.source_timeout(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            source_timeout: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started: u64,
    pub published: u64,
    pub abandoned: u64,
    pub suppressed: u64,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    published: AtomicU64,
    abandoned: AtomicU64,
    suppressed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { generation: u64, is_live: bool },
    /// Another cycle was already polling.
    Suppressed,
    /// Teardown happened while the cycle was in flight; result discarded.
    Abandoned,
    /// Teardown happened before the cycle started.
    Cancelled,
}

/// Clears the polling flag however the cycle ends.
struct PollingGuard<'a>(&'a AtomicBool);

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollScheduler {
    sources: SourceSet,
    merger: Merger,
    store: SnapshotStore,
    config: SchedulerConfig,
    polling: AtomicBool,
    cancel: CancellationToken,
    counters: Counters,
}

impl PollScheduler {
    pub fn new(sources: SourceSet, store: SnapshotStore, config: SchedulerConfig) -> Self {
        Self {
            sources,
            merger: Merger::default(),
            store,
            config,
            polling: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    pub fn with_merger(mut self, merger: Merger) -> Self {
        self.merger = merger;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            started: self.counters.started.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
        }
    }

    /// Run one cycle now, unless one is already polling.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        if self
            .polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("cycle already polling, trigger suppressed");
            return CycleOutcome::Suppressed;
        }
        let _guard = PollingGuard(&self.polling);
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        self.store.set_loading(true);

        let started_at = Utc::now();
        let request = FetchRequest::new(started_at).with_fallback_profile(self.store.fallback_profile());
        let (metrics, metadata, fallback) = tokio::join!(
            self.fetch(self.sources.metrics.as_ref(), &request),
            self.fetch(self.sources.metadata.as_ref(), &request),
            self.fetch(self.sources.fallback.as_ref(), &request),
        );

        if self.cancel.is_cancelled() {
            self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
            self.store.clear_loading();
            tracing::debug!(reason = %ErrorKind::TeardownRace, "discarding cycle result");
            return CycleOutcome::Abandoned;
        }

        let snapshot = self.merger.merge(metrics, metadata, fallback, started_at);
        let is_live = snapshot.is_live();
        let threat_level = snapshot.metrics().threat_level().value();
        let agents = snapshot.agents().len();
        let generation = self.store.publish(snapshot);
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        tracing::info!(generation, is_live, threat_level, agents, "snapshot published");

        CycleOutcome::Published {
            generation,
            is_live,
        }
    }

    async fn fetch(&self, client: &dyn SourceClient, request: &FetchRequest) -> SourceResult {
        let after = self.config.source_timeout;
        match tokio::time::timeout(after, client.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                origin: client.kind(),
                after,
            }),
        }
    }

    /// Drive cycles off the timer and manual refresh requests until teardown.
    /// Each cycle runs as its own task so a slow cycle never delays the
    /// timer; overlapping triggers are suppressed by [`Self::run_cycle`].
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = self.config.interval.as_millis() as u64, "poll scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.store.refresh_requested() => {
                    tracing::debug!("manual refresh requested");
                }
            }
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.run_cycle().await;
            });
        }
        tracing::info!("poll scheduler stopped");
    }

    pub fn spawn(self: &Arc<Self>) -> SchedulerHandle {
        SchedulerHandle {
            scheduler: Arc::clone(self),
            task: tokio::spawn(Arc::clone(self).run()),
        }
    }

    /// Stop the timer and mark any in-flight cycle abandoned.
    pub fn teardown(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(polling = self.is_polling(), "poll scheduler teardown");
        }
        self.cancel.cancel();
    }
}

pub struct SchedulerHandle {
    scheduler: Arc<PollScheduler>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    pub async fn shutdown(self) -> Result<()> {
        self.scheduler.teardown();
        self.task.await.context("poll scheduler task failed")
    }
}
