//! Shared state behind the request queue.
//!
//! Lock order is `state` before `cache`. Neither lock is ever held while a
//! payload executes.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cache::ResultCache;
use super::heartbeat::HeartbeatMonitor;
use super::identity::JobIdentity;
use super::job::{JobRecord, JobStatus};
use super::stats::QueueCounters;
use crate::config::QueueConfig;

/// An occupied execution slot
#[derive(Debug, Clone)]
pub(crate) struct ActiveRun {
    pub identity: JobIdentity,
    pub started: Instant,
}

pub(crate) struct QueueState {
    /// Live index: at most one record per identity
    pub records: HashMap<JobIdentity, JobRecord>,
    /// Identities waiting for a slot, in submission order
    pub pending: VecDeque<JobIdentity>,
    /// Slots keyed by attempt id. A cancelled run keeps its slot until the
    /// payload actually returns.
    pub active: HashMap<u64, ActiveRun>,
    pub last_start: Option<Instant>,
    next_attempt_id: u64,
}

impl QueueState {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            pending: VecDeque::new(),
            active: HashMap::new(),
            last_start: None,
            next_attempt_id: 1,
        }
    }

    pub fn allocate_attempt_id(&mut self) -> u64 {
        let id = self.next_attempt_id;
        self.next_attempt_id += 1;
        id
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.records
            .values()
            .filter(|record| record.status == status)
            .count()
    }

    /// 1-based position in the pending FIFO
    pub fn position_of(&self, identity: &JobIdentity) -> Option<usize> {
        self.pending
            .iter()
            .position(|queued| queued == identity)
            .map(|index| index + 1)
    }

    /// Time left before another job may start
    pub fn cooldown_remaining(&self, cooldown: Duration, now: Instant) -> Duration {
        match self.last_start {
            Some(last) => cooldown.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

pub(crate) struct Shared {
    pub config: QueueConfig,
    pub state: Mutex<QueueState>,
    pub cache: RwLock<ResultCache>,
    pub counters: QueueCounters,
    pub heartbeats: HeartbeatMonitor,
    /// Wakes the scheduler when a job is queued or a slot frees up
    pub wakeup: Notify,
    /// Wakes `wait` callers when any job reaches a terminal state
    pub completions: Notify,
    pub shutdown: CancellationToken,
}

impl Shared {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            cache: RwLock::new(ResultCache::new(config.result_ttl)),
            heartbeats: HeartbeatMonitor::new(config.heartbeat_timeout),
            state: Mutex::new(QueueState::new()),
            counters: QueueCounters::new(),
            wakeup: Notify::new(),
            completions: Notify::new(),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Cancel a live job while the caller holds the state lock. Returns
    /// whether a cancellation happened.
    pub fn cancel_locked(&self, state: &mut QueueState, identity: &JobIdentity) -> bool {
        let Some(record) = state.records.get_mut(identity) else {
            return false;
        };

        match record.status {
            JobStatus::Pending => {
                record.transition(JobStatus::Cancelled);
                state.pending.retain(|queued| queued != identity);
                self.counters.record_cancelled_pending();
                info!(identity = %identity, "Cancelled pending job");
            }
            JobStatus::Processing => {
                record.transition(JobStatus::Cancelled);
                // The payload keeps running unless it observes the token.
                record.cancellation_token.cancel();
                self.counters.record_cancelled_processing();
                info!(
                    identity = %identity,
                    attempt_id = ?record.attempt_id,
                    "Cancelled processing job; its result will be discarded"
                );
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jobs::job::job_fn;
    use serde_json::json;

    fn record(id: &str) -> JobRecord {
        JobRecord::new(
            JobIdentity::new(id),
            job_fn("noop", |_ctx| async { Ok(json!(1)) }),
        )
    }

    fn enqueue(state: &mut QueueState, id: &str) {
        state.records.insert(JobIdentity::new(id), record(id));
        state.pending.push_back(JobIdentity::new(id));
    }

    #[test]
    fn test_positions_follow_submission_order() {
        let mut state = QueueState::new();
        enqueue(&mut state, "a");
        enqueue(&mut state, "b");

        assert_eq!(state.position_of(&JobIdentity::new("a")), Some(1));
        assert_eq!(state.position_of(&JobIdentity::new("b")), Some(2));
        assert_eq!(state.position_of(&JobIdentity::new("c")), None);
    }

    #[test]
    fn test_cancel_pending_removes_from_queue() {
        let shared = Shared::new(QueueConfig::default());
        let mut state = QueueState::new();
        enqueue(&mut state, "a");
        enqueue(&mut state, "b");

        assert!(shared.cancel_locked(&mut state, &JobIdentity::new("a")));
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.position_of(&JobIdentity::new("b")), Some(1));
        assert_eq!(
            state.records[&JobIdentity::new("a")].status,
            JobStatus::Cancelled
        );

        // Second cancel is a no-op.
        assert!(!shared.cancel_locked(&mut state, &JobIdentity::new("a")));
        assert!(!shared.cancel_locked(&mut state, &JobIdentity::new("missing")));
    }

    #[test]
    fn test_cancel_processing_trips_token() {
        let shared = Shared::new(QueueConfig::default());
        let mut state = QueueState::new();
        enqueue(&mut state, "a");
        state.pending.clear();
        let id = JobIdentity::new("a");
        let token = {
            let rec = state.records.get_mut(&id).unwrap();
            rec.transition(JobStatus::Processing);
            rec.cancellation_token.clone()
        };

        assert!(shared.cancel_locked(&mut state, &id));
        assert!(token.is_cancelled());
        assert_eq!(
            shared
                .counters
                .cancelled_processing
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_cooldown_remaining() {
        let mut state = QueueState::new();
        let now = Instant::now();
        let cooldown = Duration::from_secs(2);
        assert_eq!(state.cooldown_remaining(cooldown, now), Duration::ZERO);

        state.last_start = Some(now);
        assert_eq!(
            state.cooldown_remaining(cooldown, now + Duration::from_millis(500)),
            Duration::from_millis(1500)
        );
        assert_eq!(
            state.cooldown_remaining(cooldown, now + Duration::from_secs(3)),
            Duration::ZERO
        );
    }
}
