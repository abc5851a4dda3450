//! Periodic garbage collection of expired results, orphaned jobs and
//! terminal records, bounded per pass by `batch_cleanup_threshold`.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::identity::JobIdentity;
use super::state::Shared;

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_results: usize,
    pub orphans_cancelled: usize,
    pub records_removed: usize,
    /// Stale entries left for a later sweep
    pub remaining: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired_results + self.orphans_cancelled + self.records_removed
    }

    pub fn is_clean(&self) -> bool {
        self.remaining == 0
    }
}

pub(crate) fn spawn_sweeper(shared: Arc<Shared>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(shared.config.cleanup_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        info!(
            interval_ms = shared.config.cleanup_interval.as_millis() as u64,
            batch = shared.config.batch_cleanup_threshold,
            "Starting cleanup sweeper"
        );

        loop {
            tokio::select! {
                _ = shared.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    sweep(&shared).await;
                }
            }
        }

        info!("Cleanup sweeper stopped");
    })
}

/// One bounded sweep. Steps run in order and share a single budget:
/// evict expired results, cancel orphans, drop terminal records.
///
/// Only records that were already terminal when the sweep began are
/// dropped, so a job cancelled as an orphan stays visible as `cancelled`
/// until the next sweep.
pub(crate) async fn sweep(shared: &Shared) -> SweepReport {
    let now = Instant::now();
    let mut budget = shared.config.batch_cleanup_threshold;
    let mut report = SweepReport::default();

    let mut state = shared.state.lock().await;

    let mut removable: Vec<(chrono::DateTime<chrono::Utc>, JobIdentity)> = state
        .records
        .values()
        .filter(|record| record.status.is_terminal())
        .map(|record| {
            (
                record.completed_at.unwrap_or(record.submitted_at),
                record.identity.clone(),
            )
        })
        .collect();
    removable.sort();

    let mut cache = shared.cache.write().await;

    let evicted = cache.evict_expired(now, budget);
    report.expired_results = evicted.len();
    budget -= evicted.len();

    let orphans = shared.heartbeats.find_orphans(&state.records, now, budget);
    for identity in &orphans {
        if shared.cancel_locked(&mut state, identity) {
            warn!(
                identity = %identity,
                timeout_ms = shared.heartbeats.timeout().as_millis() as u64,
                "Reclaimed orphaned job after heartbeat timeout"
            );
            report.orphans_cancelled += 1;
        }
    }
    budget -= orphans.len();

    removable.truncate(budget);
    for (_, identity) in &removable {
        if state.records.remove(identity).is_some() {
            report.records_removed += 1;
        }
    }

    report.remaining = cache.expired_count(now)
        + shared
            .heartbeats
            .find_orphans(&state.records, now, usize::MAX)
            .len()
        + state
            .records
            .values()
            .filter(|record| record.status.is_terminal())
            .count();

    drop(cache);
    drop(state);

    if report.orphans_cancelled > 0 {
        shared.completions.notify_waiters();
    }

    if report.total() > 0 {
        info!(
            expired_results = report.expired_results,
            orphans_cancelled = report.orphans_cancelled,
            records_removed = report.records_removed,
            remaining = report.remaining,
            "Cleanup sweep finished"
        );
    } else {
        debug!(remaining = report.remaining, "Cleanup sweep found nothing to do");
    }

    report
}
