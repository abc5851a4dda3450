//! Worker scheduler: moves pending jobs into execution slots under the
//! concurrency cap and the inter-start cooldown.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::cache::CacheEntry;
use super::identity::JobIdentity;
use super::job::{Job, JobContext, JobOutcome, JobStatus};
use super::state::{ActiveRun, Shared};
use crate::error::AppError;

pub(crate) fn spawn_scheduler(shared: Arc<Shared>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            max_concurrent = shared.config.max_concurrent,
            cooldown_ms = shared.config.cooldown_period.as_millis() as u64,
            "Starting request scheduler"
        );

        loop {
            let idle_for = dispatch(&shared).await;

            tokio::select! {
                _ = shared.shutdown.cancelled() => break,
                _ = shared.wakeup.notified() => {}
                _ = tokio::time::sleep(idle_for) => {}
            }
        }

        info!("Request scheduler stopped");
    })
}

/// Start every pending job that the free slots and the cooldown allow, in
/// FIFO order. Returns how long the loop may sleep before the next pass.
pub(crate) async fn dispatch(shared: &Arc<Shared>) -> Duration {
    let tick = shared.config.scheduler_tick;
    let cooldown = shared.config.cooldown_period;
    let mut state = shared.state.lock().await;

    loop {
        if state.active.len() >= shared.config.max_concurrent || state.pending.is_empty() {
            return tick;
        }

        let now = Instant::now();
        let remaining = state.cooldown_remaining(cooldown, now);
        if !remaining.is_zero() {
            return remaining.min(tick);
        }

        let Some(identity) = state.pending.pop_front() else {
            return tick;
        };
        let attempt_id = state.allocate_attempt_id();

        let Some(record) = state.records.get_mut(&identity) else {
            warn!(identity = %identity, "Queued identity has no record; skipping");
            continue;
        };
        if !record.transition(JobStatus::Processing) {
            debug!(identity = %identity, status = %record.status, "Skipping non-pending job");
            continue;
        }
        record.attempt_id = Some(attempt_id);

        let payload = Arc::clone(&record.payload);
        let context = JobContext {
            identity: identity.clone(),
            attempt_id,
            cancellation_token: record.cancellation_token.clone(),
        };
        let queued_for = (chrono::Utc::now() - record.submitted_at)
            .to_std()
            .unwrap_or_default();

        state.last_start = Some(now);
        state.active.insert(
            attempt_id,
            ActiveRun {
                identity: identity.clone(),
                started: now,
            },
        );

        info!(
            identity = %identity,
            attempt_id = attempt_id,
            job = payload.name(),
            queued_ms = queued_for.as_millis() as u64,
            active = state.active.len(),
            "Job started"
        );

        launch(Arc::clone(shared), payload, context);
    }
}

/// Run the payload on its own task so a panic or error stays inside that
/// task, then record the outcome.
fn launch(shared: Arc<Shared>, payload: Arc<dyn Job>, context: JobContext) {
    tokio::spawn(async move {
        let identity = context.identity.clone();
        let attempt_id = context.attempt_id;

        let execution = tokio::spawn(async move { payload.execute(&context).await });

        let result = execution.await.unwrap_or_else(|join_error| Err(join_error.into()));
        let outcome = match result {
            Ok(serde_json::Value::Null) => JobOutcome::Failed("Job returned no data".to_string()),
            Ok(value) => JobOutcome::Completed(value),
            Err(AppError::JobFailed(message)) => JobOutcome::Failed(message),
            Err(e) => JobOutcome::Failed(e.to_string()),
        };

        finish(&shared, &identity, attempt_id, outcome).await;
    });
}

/// Record a finished execution and free its slot. The outcome is dropped if
/// the record was cancelled or replaced while the payload ran.
pub(crate) async fn finish(
    shared: &Shared,
    identity: &JobIdentity,
    attempt_id: u64,
    outcome: JobOutcome,
) {
    let mut state = shared.state.lock().await;
    let slot = state.active.remove(&attempt_id);
    let held_ms = slot
        .as_ref()
        .map(|run| run.started.elapsed().as_millis() as u64)
        .unwrap_or_default();

    match state.records.get_mut(identity) {
        Some(record)
            if record.attempt_id == Some(attempt_id)
                && record.status == JobStatus::Processing =>
        {
            let next = outcome.status();
            record.transition(next);
            let run_time = record.run_time().unwrap_or_default();
            record.outcome = Some(outcome.clone());

            let entry = CacheEntry::from_record(record, outcome.clone());
            if !shared.cache.write().await.insert(identity.clone(), entry) {
                error!(identity = %identity, "Result already cached; keeping the earlier entry");
            }

            match outcome {
                JobOutcome::Completed(_) => {
                    shared.counters.record_completed(run_time);
                    info!(
                        identity = %identity,
                        attempt_id = attempt_id,
                        duration_ms = run_time.as_millis() as u64,
                        "Job completed successfully"
                    );
                }
                JobOutcome::Failed(message) => {
                    shared.counters.record_failed();
                    warn!(
                        identity = %identity,
                        attempt_id = attempt_id,
                        error = %message,
                        "Job failed"
                    );
                }
            }
        }
        Some(record) => {
            debug!(
                identity = %identity,
                attempt_id = attempt_id,
                status = %record.status,
                held_ms = held_ms,
                "Discarding result of cancelled or superseded run"
            );
        }
        None => {
            debug!(
                identity = %identity,
                attempt_id = attempt_id,
                slot_identity = ?slot.map(|run| run.identity),
                "Discarding result of a run whose record was already swept"
            );
        }
    }
    drop(state);

    shared.wakeup.notify_one();
    shared.completions.notify_waiters();
}
