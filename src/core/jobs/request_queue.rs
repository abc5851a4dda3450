//! In-process request queue with deduplication, bounded concurrency,
//! start cooldown, result caching, heartbeats and background cleanup.
//!
//! # Cancellation
//!
//! Cancelling a job that is already processing is best-effort. The job's
//! status becomes `cancelled` and its eventual result is discarded, but the
//! payload itself is not interrupted: it only stops early if it observes
//! [`JobContext::cancellation_token`](super::job::JobContext). Until the
//! payload returns, its execution slot stays occupied.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::identity::JobIdentity;
use super::job::{Job, JobOutcome, JobRecord, JobStatus, JobStatusReport};
use super::scheduler::spawn_scheduler;
use super::state::Shared;
use super::stats::QueueStats;
use super::sweeper::{spawn_sweeper, sweep, SweepReport};
use crate::config::QueueConfig;
use crate::error::{AppError, Result};

pub struct RequestQueue {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RequestQueue {
    /// Build a queue. Fails only on invalid configuration. Background
    /// processing begins with [`RequestQueue::start`].
    pub fn new(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(config)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Spawn the scheduler loop and the periodic sweeper.
    pub async fn start(&self) -> Result<()> {
        if self.shared.shutdown.is_cancelled() {
            return Err(AppError::InternalServerError(
                "Request queue has been stopped and cannot be restarted".to_string(),
            ));
        }

        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            warn!("Request queue already started");
            return Ok(());
        }

        tasks.push(spawn_scheduler(Arc::clone(&self.shared)));
        tasks.push(spawn_sweeper(Arc::clone(&self.shared)));
        info!("Request queue started");
        Ok(())
    }

    /// Stop background processing. Payloads already running are left to
    /// finish on their own.
    pub async fn stop(&self) {
        self.shared.shutdown.cancel();
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Request queue stopped");
    }

    /// Enqueue `payload` under `identity`, or return the identity unchanged
    /// when a live job or a cached successful result already covers it.
    ///
    /// Any other terminal record (failed, cancelled, or its result already
    /// evicted) is replaced by a fresh pending record. A cached failure is
    /// dropped so the new run can record its own outcome.
    pub async fn submit(&self, identity: JobIdentity, payload: Arc<dyn Job>) -> JobIdentity {
        let mut state = self.shared.state.lock().await;

        let existing = state.records.get(&identity).map(|record| record.status);
        if let Some(status) = existing {
            if !status.is_terminal() {
                debug!(identity = %identity, status = %status, "Duplicate submission absorbed");
                return identity;
            }
        }
        {
            let mut cache = self.shared.cache.write().await;
            match cache.get(&identity).map(|entry| entry.outcome.status()) {
                Some(JobStatus::Completed) => {
                    debug!(identity = %identity, "Submission served from cached result");
                    return identity;
                }
                Some(_) => {
                    cache.remove(&identity);
                    info!(identity = %identity, "Dropping cached failure to retry job");
                }
                None => {}
            }
        }
        if let Some(status) = existing {
            info!(identity = %identity, previous = %status, "Recomputing job with no cached result");
        }

        let record = JobRecord::new(identity.clone(), payload);
        state.records.insert(identity.clone(), record);
        state.pending.push_back(identity.clone());
        self.shared.counters.record_submit();

        info!(
            identity = %identity,
            position = state.pending.len(),
            "Job submitted to queue"
        );
        drop(state);

        self.shared.wakeup.notify_one();
        identity
    }

    /// Status and timestamps of a job. Falls back to the cached result when
    /// the record itself has already been swept.
    pub async fn status(&self, identity: &JobIdentity) -> Option<JobStatusReport> {
        {
            let state = self.shared.state.lock().await;
            if let Some(record) = state.records.get(identity) {
                let mut report = JobStatusReport::from_record(record);
                if record.status == JobStatus::Pending {
                    if let Some(position) = state.position_of(identity) {
                        report.position = Some(position);
                        report.estimated_wait = Some(self.estimate_wait(position));
                    }
                }
                return Some(report);
            }
        }

        let cache = self.shared.cache.read().await;
        cache.get(identity).map(|entry| JobStatusReport {
            identity: identity.clone(),
            status: entry.outcome.status(),
            position: None,
            estimated_wait: None,
            error_message: entry.outcome.error().map(str::to_string),
            submitted_at: entry.submitted_at,
            started_at: entry.started_at,
            completed_at: Some(entry.completed_at),
            last_heartbeat_at: entry.last_heartbeat_at,
        })
    }

    /// Rounds of `max_concurrent` starts ahead of `position`, each costing
    /// the larger of the cooldown and the average run time.
    fn estimate_wait(&self, position: usize) -> Duration {
        let config = &self.shared.config;
        let per_round = self
            .shared
            .counters
            .average_run_time()
            .map_or(config.cooldown_period, |avg| avg.max(config.cooldown_period));
        let rounds = position.div_ceil(config.max_concurrent).saturating_sub(1);
        per_round * rounds as u32
    }

    /// Terminal result, if any. Never waits.
    pub async fn result(&self, identity: &JobIdentity) -> Option<JobOutcome> {
        if let Some(outcome) = self.shared.cache.read().await.outcome(identity) {
            return Some(outcome);
        }
        let state = self.shared.state.lock().await;
        state
            .records
            .get(identity)
            .and_then(|record| record.outcome.clone())
    }

    /// Block until the job has a terminal result or `timeout` elapses.
    ///
    /// Errors: `NotFound` for an unknown identity, `Cancelled` if the job
    /// was cancelled, `TimeoutError` if it is still pending or processing.
    pub async fn wait(&self, identity: &JobIdentity, timeout: Duration) -> Result<JobOutcome> {
        let started = Instant::now();
        let poll_interval = self.shared.config.wait_poll_interval;

        let polling = async {
            loop {
                // Registered before checking so a completion in between still wakes us.
                let notified = self.shared.completions.notified();

                if let Some(outcome) = self.result(identity).await {
                    return Ok(outcome);
                }
                match self.status(identity).await {
                    None => return Err(AppError::NotFound(identity.to_string())),
                    Some(report) if report.status == JobStatus::Cancelled => {
                        return Err(AppError::Cancelled(identity.to_string()))
                    }
                    Some(_) => {}
                }

                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        };

        match tokio::time::timeout(timeout, polling).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::TimeoutError {
                identity: identity.to_string(),
                waited: started.elapsed(),
            }),
        }
    }

    /// Record a liveness ping. Returns whether the job is still live.
    pub async fn heartbeat(&self, identity: &JobIdentity) -> bool {
        let mut state = self.shared.state.lock().await;
        match state.records.get_mut(identity) {
            Some(record) => {
                let tracked = self.shared.heartbeats.beat(record);
                debug!(identity = %identity, tracked = tracked, "Heartbeat received");
                tracked
            }
            None => false,
        }
    }

    /// Cancel a live job. Returns false if it was unknown or already terminal.
    pub async fn cancel(&self, identity: &JobIdentity) -> bool {
        let cancelled = {
            let mut state = self.shared.state.lock().await;
            self.shared.cancel_locked(&mut state, identity)
        };

        if cancelled {
            self.shared.completions.notify_waiters();
        } else {
            debug!(identity = %identity, "Cancel ignored for unknown or terminal job");
        }
        cancelled
    }

    pub async fn stats(&self) -> QueueStats {
        let counters = &self.shared.counters;
        let (pending_count, processing_count, active_slots) = {
            let state = self.shared.state.lock().await;
            (
                state.pending.len(),
                state.count_with_status(JobStatus::Processing),
                state.active.len(),
            )
        };
        let cache_size = self.shared.cache.read().await.len();

        QueueStats {
            pending_count,
            processing_count,
            completed_count: counters.completed.load(Ordering::Relaxed),
            failed_count: counters.failed.load(Ordering::Relaxed),
            cancelled_pending_count: counters.cancelled_pending.load(Ordering::Relaxed),
            cancelled_processing_count: counters.cancelled_processing.load(Ordering::Relaxed),
            cache_size,
            total_submitted: counters.total_submitted.load(Ordering::Relaxed),
            active_slots,
        }
    }

    /// Run one bounded sweep now, regardless of the cleanup interval.
    pub async fn force_cleanup(&self) -> SweepReport {
        info!("Forced cleanup requested");
        sweep(&self.shared).await
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}
