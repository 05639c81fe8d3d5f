//! Plain-text consumer: one summary line per published snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use crimsonwatch_application::{SnapshotStore, StoreUpdate, Subscription};
use crimsonwatch_domain::{AgentStatus, AlertSeverity};

pub fn render(update: &StoreUpdate) -> String {
    let snapshot = &update.snapshot;
    let metrics = snapshot.metrics();
    let count = |status: AgentStatus| {
        snapshot
            .agents()
            .iter()
            .filter(|agent| agent.status == status)
            .count()
    };
    let open_alerts = snapshot
        .alerts()
        .iter()
        .filter(|alert| !alert.acknowledged && alert.severity >= AlertSeverity::Med)
        .count();
    let source = if snapshot.is_live() { "live" } else { "offline" };

    let mut line = format!(
        "#{generation} [{source}] threat {level} {status:?} | blocked {blocked} | agents {agents} ({active} active, {warning} warning, {blocked_agents} blocked) | open alerts {open_alerts} | high {high}",
        generation = update.generation,
        level = metrics.threat_level().value(),
        status = metrics.threat_status(),
        blocked = metrics.blocked_calls_total,
        agents = metrics.active_agents(),
        active = count(AgentStatus::Active),
        warning = count(AgentStatus::Warning),
        blocked_agents = count(AgentStatus::Blocked),
        high = metrics.high_severity_alerts,
    );
    if let Some(kind) = update.last_error {
        line.push_str(&format!(" | {kind}"));
    }
    line
}

/// Print every new publication to stdout. Loading flips are skipped.
pub fn attach(store: &SnapshotStore) -> Subscription {
    let last = AtomicU64::new(0);
    store.subscribe(move |update| {
        if update.generation > last.swap(update.generation, Ordering::Relaxed) {
            println!("{}", render(update));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use crimsonwatch_domain::{
        AgentRecord, ErrorKind, MetricsSnapshot, SecuritySnapshot, ThreatLevel,
    };

    #[test]
    fn test_render_summary_line() {
        let agent = AgentRecord {
            id: "a1".into(),
            name: "research-agent".into(),
            status: AgentStatus::Blocked,
            risk_score: 78.0,
            blocked_calls: 15,
            last_activity: Utc::now(),
            tools_used: Vec::new(),
        };
        let snapshot = SecuritySnapshot::new(
            MetricsSnapshot::new(Utc::now(), ThreatLevel::new(50), 10, 0, 0),
            vec![agent],
            Vec::new(),
            Vec::new(),
            false,
        );
        let line = render(&StoreUpdate {
            snapshot: Arc::new(snapshot),
            loading: false,
            last_error: Some(ErrorKind::AllSourcesFailed),
            generation: 4,
        });
        assert!(line.starts_with("#4 [offline] threat 50 Elevated"));
        assert!(line.contains("agents 1 (0 active, 0 warning, 1 blocked)"));
        assert!(line.ends_with("no live source returned data"));
    }
}
