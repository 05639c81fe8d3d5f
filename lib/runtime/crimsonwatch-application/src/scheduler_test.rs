use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crimsonwatch_domain::{
    AgentRecord, AgentStatus, ErrorKind, FallbackProfile, MetricsSnapshot, SecuritySnapshot,
    ThreatLevel,
};
use crimsonwatch_ports::{
    FetchRequest, MetadataPayload, MetricsPayload, RawPayload, SourceClient, SourceError,
    SourceKind, SourceResult, SourceSet,
};

use crate::merger::Merger;
use crate::scheduler::{CycleOutcome, PollScheduler, SchedulerConfig};
use crate::store::SnapshotStore;
use crate::synthesizer::{QUIET_BAND, Synthesizer};

struct ScriptedSource {
    kind: SourceKind,
    delay: Duration,
    result: SourceResult,
    calls: AtomicUsize,
    last_profile: Mutex<Option<FallbackProfile>>,
}

impl ScriptedSource {
    fn new(kind: SourceKind, delay: Duration, result: SourceResult) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay,
            result,
            calls: AtomicUsize::new(0),
            last_profile: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, request: &FetchRequest) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_profile.lock().unwrap() = request.fallback_profile;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

fn blocked_metrics(delay: Duration) -> Arc<ScriptedSource> {
    ScriptedSource::new(
        SourceKind::Metrics,
        delay,
        Ok(RawPayload::Metrics(MetricsPayload {
            blocked_calls_total: Some(10),
            ..MetricsPayload::default()
        })),
    )
}

fn one_agent_metadata() -> Arc<ScriptedSource> {
    ScriptedSource::new(
        SourceKind::Metadata,
        Duration::ZERO,
        Ok(RawPayload::Metadata(MetadataPayload {
            agents: Some(vec![AgentRecord {
                id: "a1".into(),
                name: "research-agent".into(),
                status: AgentStatus::Blocked,
                risk_score: 78.0,
                blocked_calls: 15,
                last_activity: Utc::now(),
                tools_used: vec!["web_search".into()],
            }]),
            alerts: None,
        })),
    )
}

fn scheduler(sources: SourceSet, store: SnapshotStore, config: SchedulerConfig) -> Arc<PollScheduler> {
    Arc::new(PollScheduler::new(sources, store, config).with_merger(Merger::new(Synthesizer::seeded(1))))
}

#[tokio::test(start_paused = true)]
async fn test_refresh_during_cycle_starts_no_second_cycle() {
    let metrics = blocked_metrics(Duration::from_secs(1));
    let store = SnapshotStore::new();
    let scheduler = scheduler(
        SourceSet::empty().with_metrics(metrics.clone()),
        store.clone(),
        SchedulerConfig::default(),
    );

    let first = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_cycle().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(scheduler.is_polling());
    assert!(store.state().loading);
    assert!(!store.manual_refresh());
    assert_eq!(scheduler.run_cycle().await, CycleOutcome::Suppressed);

    let outcome = first.await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            generation: 1,
            is_live: true
        }
    );
    assert_eq!(metrics.calls(), 1);
    let stats = scheduler.stats();
    assert_eq!((stats.started, stats.published, stats.suppressed), (1, 1, 1));
    assert!(!scheduler.is_polling());
    assert!(!store.state().loading);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_discards_in_flight_cycle() {
    let metrics = blocked_metrics(Duration::from_secs(2));
    let store = SnapshotStore::new();
    let publishes = Arc::new(AtomicUsize::new(0));
    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = publishes.clone();
    let seen = notifications.clone();
    let _sub = store.subscribe(move |update| {
        seen.fetch_add(1, Ordering::SeqCst);
        if update.generation > 0 {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let scheduler = scheduler(
        SourceSet::empty().with_metrics(metrics.clone()),
        store.clone(),
        SchedulerConfig::default(),
    );

    let in_flight = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_cycle().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(store.state().loading);
    assert_eq!(notifications.load(Ordering::SeqCst), 1);
    scheduler.teardown();

    assert_eq!(in_flight.await.unwrap(), CycleOutcome::Abandoned);
    assert_eq!(scheduler.run_cycle().await, CycleOutcome::Cancelled);
    assert_eq!(store.state().generation, 0);
    assert!(!store.state().loading);
    assert!(store.manual_refresh());
    assert_eq!(notifications.load(Ordering::SeqCst), 1);
    assert_eq!(publishes.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.stats().abandoned, 1);
    assert_eq!(scheduler.stats().published, 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_sources_timing_out_synthesizes() {
    let hang = Duration::from_secs(60);
    let sources = SourceSet::empty()
        .with_metrics(blocked_metrics(hang))
        .with_metadata(ScriptedSource::new(
            SourceKind::Metadata,
            hang,
            Ok(RawPayload::Metadata(MetadataPayload::default())),
        ))
        .with_fallback(ScriptedSource::new(
            SourceKind::Fallback,
            hang,
            Err(SourceError::Disabled {
                origin: SourceKind::Fallback,
            }),
        ));
    let store = SnapshotStore::new();
    let scheduler = scheduler(sources, store.clone(), SchedulerConfig::default());

    let started = tokio::time::Instant::now();
    let outcome = scheduler.run_cycle().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            generation: 1,
            is_live: false
        }
    );
    let state = store.state();
    assert!(!state.snapshot.is_live());
    assert!(QUIET_BAND.contains(&state.snapshot.metrics().threat_level().value()));
    assert_eq!(state.last_error, Some(ErrorKind::AllSourcesFailed));
}

#[tokio::test(start_paused = true)]
async fn test_metadata_survives_metrics_outage() {
    let sources = SourceSet::empty()
        .with_metrics(ScriptedSource::new(
            SourceKind::Metrics,
            Duration::ZERO,
            Err(SourceError::Unreachable {
                origin: SourceKind::Metrics,
                reason: "connection refused".into(),
            }),
        ))
        .with_metadata(one_agent_metadata());
    let store = SnapshotStore::new();
    let scheduler = scheduler(sources, store.clone(), SchedulerConfig::default());

    scheduler.run_cycle().await;

    let current = store.get_current();
    assert!(current.is_live());
    assert_eq!(current.agents().len(), 1);
    assert_eq!(current.agents()[0].id, "a1");
    assert_eq!(current.metrics().active_agents(), 1);
    assert_eq!(store.state().last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_selected_profile_reaches_fallback_source() {
    let fixture = SecuritySnapshot::new(
        MetricsSnapshot::new(Utc::now(), ThreatLevel::new(86), 31, 0, 4),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        false,
    );
    let fallback = ScriptedSource::new(
        SourceKind::Fallback,
        Duration::ZERO,
        Ok(RawPayload::Fallback(Box::new(fixture))),
    );
    let store = SnapshotStore::with_profile(Some(FallbackProfile::Attack));
    let scheduler = scheduler(
        SourceSet::empty().with_fallback(fallback.clone()),
        store.clone(),
        SchedulerConfig::default(),
    );

    scheduler.run_cycle().await;

    assert_eq!(*fallback.last_profile.lock().unwrap(), Some(FallbackProfile::Attack));
    assert_eq!(store.get_current().metrics().threat_level().value(), 86);
    assert!(!store.get_current().is_live());
}

#[tokio::test(start_paused = true)]
async fn test_timer_drives_cycles_until_shutdown() {
    let metadata = one_agent_metadata();
    let store = SnapshotStore::new();
    let scheduler = scheduler(
        SourceSet::empty().with_metadata(metadata.clone()),
        store.clone(),
        SchedulerConfig::default(),
    );

    let handle = scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(12_500)).await;
    assert_eq!(store.state().generation, 3);

    handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(store.state().generation, 3);
    assert_eq!(metadata.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_runs_out_of_band_cycle() {
    let store = SnapshotStore::new();
    let scheduler = scheduler(
        SourceSet::empty().with_metadata(one_agent_metadata()),
        store.clone(),
        SchedulerConfig::default().with_interval(Duration::from_secs(60)),
    );

    let handle = scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.state().generation, 1);

    assert!(store.manual_refresh());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.state().generation, 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycles_never_overlap() {
    let metrics = blocked_metrics(Duration::from_millis(2500));
    let scheduler = scheduler(
        SourceSet::empty().with_metrics(metrics.clone()),
        SnapshotStore::new(),
        SchedulerConfig::default().with_interval(Duration::from_secs(1)),
    );

    let handle = scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(3200)).await;

    let stats = scheduler.stats();
    assert_eq!(stats.started, 2);
    assert_eq!(stats.published, 1);
    assert_eq!(stats.suppressed, 2);
    assert_eq!(metrics.calls(), 2);

    handle.shutdown().await.unwrap();
}
