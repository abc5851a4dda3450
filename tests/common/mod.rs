#![allow(dead_code)]

use seatwatch::{JobIdentity, JobStatus, QueueConfig, RequestQueue};
use std::time::Duration;

// Test utilities and common setup
pub mod fixtures;

pub use fixtures::*;

/// Queue settings tuned for fast tests: one slot, no cooldown, short ticks,
/// and sweeps that only run when forced.
pub fn test_config() -> QueueConfig {
    QueueConfig::default()
        .with_max_concurrent(1)
        .with_cooldown(Duration::ZERO)
        .with_scheduler_tick(Duration::from_millis(10))
        .with_wait_poll_interval(Duration::from_millis(10))
        .with_cleanup_interval(Duration::from_secs(3600))
        .with_heartbeat_timeout(Duration::from_secs(3600))
}

pub async fn started_queue(config: QueueConfig) -> RequestQueue {
    let queue = RequestQueue::new(config).expect("valid test config");
    queue.start().await.expect("queue starts");
    queue
}

/// Poll until the job reaches `expected`, panicking after `timeout`.
pub async fn wait_for_status(
    queue: &RequestQueue,
    identity: &JobIdentity,
    expected: JobStatus,
    timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let current = queue.status(identity).await.map(|report| report.status);
        if current == Some(expected) {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "job {} did not reach {} within {:?} (last seen {:?})",
                identity, expected, timeout, current
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
