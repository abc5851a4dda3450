use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cumulative queue counters, updated lock-free alongside state transitions
#[derive(Debug, Default)]
pub struct QueueCounters {
    pub total_submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled_pending: AtomicU64,
    pub cancelled_processing: AtomicU64,
    /// Exponential moving average of execution time, in milliseconds
    average_run_time_ms: AtomicU64,
}

impl QueueCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submit(&self) {
        self.total_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, run_time: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.record_run_time(run_time);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_pending(&self) {
        self.cancelled_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_processing(&self) {
        self.cancelled_processing.fetch_add(1, Ordering::Relaxed);
    }

    fn record_run_time(&self, run_time: Duration) {
        let sample = (run_time.as_millis() as u64).max(1);
        let current = self.average_run_time_ms.load(Ordering::Relaxed);
        let next = if current == 0 {
            sample
        } else {
            // EMA with alpha = 0.2
            (current * 4 + sample) / 5
        };
        self.average_run_time_ms.store(next, Ordering::Relaxed);
    }

    /// None until the first successful execution
    pub fn average_run_time(&self) -> Option<Duration> {
        match self.average_run_time_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Point-in-time snapshot returned by `RequestQueue::stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending_count: usize,
    pub processing_count: usize,
    pub completed_count: u64,
    pub failed_count: u64,
    pub cancelled_pending_count: u64,
    pub cancelled_processing_count: u64,
    pub cache_size: usize,
    pub total_submitted: u64,
    /// Occupied execution slots, including ones held by cancelled runs
    pub active_slots: usize,
}

impl QueueStats {
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled_pending_count + self.cancelled_processing_count
    }
}
