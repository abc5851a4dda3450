//! Liveness tracking for queued and running jobs.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::identity::JobIdentity;
use super::job::JobRecord;

/// Decides when a live job has been abandoned by its caller.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a ping. Returns false for records that are no longer live.
    pub(crate) fn beat(&self, record: &mut JobRecord) -> bool {
        if record.status.is_terminal() {
            return false;
        }
        record.touch();
        true
    }

    pub(crate) fn is_orphaned(&self, record: &JobRecord, now: Instant) -> bool {
        !record.status.is_terminal()
            && now.saturating_duration_since(record.last_seen) > self.timeout
    }

    /// Up to `limit` orphaned identities, longest-silent first.
    pub(crate) fn find_orphans(
        &self,
        records: &HashMap<JobIdentity, JobRecord>,
        now: Instant,
        limit: usize,
    ) -> Vec<JobIdentity> {
        let mut orphans: Vec<(Instant, JobIdentity)> = records
            .values()
            .filter(|record| self.is_orphaned(record, now))
            .map(|record| (record.last_seen, record.identity.clone()))
            .collect();
        orphans.sort();
        orphans.truncate(limit);
        orphans.into_iter().map(|(_, identity)| identity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jobs::job::{job_fn, JobStatus};
    use serde_json::json;

    fn record(id: &str) -> JobRecord {
        JobRecord::new(
            JobIdentity::new(id),
            job_fn("noop", |_ctx| async { Ok(json!(1)) }),
        )
    }

    #[test]
    fn test_beat_only_tracks_live_records() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(1));
        let mut live = record("live");
        assert!(monitor.beat(&mut live));

        let mut done = record("done");
        done.transition(JobStatus::Cancelled);
        assert!(!monitor.beat(&mut done));
    }

    #[test]
    fn test_orphan_detection_uses_timeout() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(5));
        let rec = record("a");
        let seen = rec.last_seen;

        assert!(!monitor.is_orphaned(&rec, seen + Duration::from_secs(5)));
        assert!(monitor.is_orphaned(&rec, seen + Duration::from_secs(6)));
    }

    #[test]
    fn test_terminal_records_are_never_orphans() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(1));
        let mut rec = record("a");
        rec.transition(JobStatus::Processing);
        rec.transition(JobStatus::Failed);
        let later = rec.last_seen + Duration::from_secs(60);
        assert!(!monitor.is_orphaned(&rec, later));
    }

    #[test]
    fn test_find_orphans_is_bounded() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(1));
        let mut records = HashMap::new();
        for id in ["a", "b", "c"] {
            records.insert(JobIdentity::new(id), record(id));
        }
        let later = Instant::now() + Duration::from_secs(10);

        assert_eq!(monitor.find_orphans(&records, later, 2).len(), 2);
        assert_eq!(monitor.find_orphans(&records, later, 10).len(), 3);
        assert!(monitor.find_orphans(&records, Instant::now(), 10).is_empty());
    }
}
