//! Job records and the payload abstraction executed by the scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::identity::JobIdentity;
use crate::error::Result;

/// Lifecycle state of a job record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Allowed edges: pending -> processing | cancelled,
    /// processing -> completed | failed | cancelled. Terminal states have none.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of an execution. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "lowercase")]
pub enum JobOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Failed(_) => JobStatus::Failed,
        }
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            JobOutcome::Completed(value) => Some(value),
            JobOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobOutcome::Completed(_) => None,
            JobOutcome::Failed(message) => Some(message),
        }
    }
}

/// Handed to the payload for each execution.
///
/// Cancellation is cooperative: `cancel` triggers the token, but the queue
/// never aborts a running payload. A payload that ignores the token runs to
/// completion and its result is discarded.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub identity: JobIdentity,
    pub attempt_id: u64,
    pub cancellation_token: CancellationToken,
}

/// The opaque unit of work run by the queue.
#[async_trait]
pub trait Job: Send + Sync {
    /// Produce the job's value. An error or a `null` value marks the job failed.
    async fn execute(&self, context: &JobContext) -> Result<serde_json::Value>;

    fn name(&self) -> &str {
        "job"
    }
}

/// Adapter turning an async closure into a [`Job`].
pub struct FnJob<F> {
    name: String,
    func: F,
}

impl<F> FnJob<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    async fn execute(&self, context: &JobContext) -> Result<serde_json::Value> {
        (self.func)(context.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn job_fn<F, Fut>(name: impl Into<String>, func: F) -> Arc<dyn Job>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    Arc::new(FnJob::new(name, func))
}

/// The queue's internal record of one submission.
pub(crate) struct JobRecord {
    pub identity: JobIdentity,
    pub status: JobStatus,
    pub payload: Arc<dyn Job>,
    pub outcome: Option<JobOutcome>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: DateTime<Utc>,
    /// Monotonic twin of `last_heartbeat_at`, used for orphan detection.
    pub last_seen: Instant,
    /// Monotonic start time, used for run-time accounting.
    pub started: Option<Instant>,
    pub attempt_id: Option<u64>,
    pub cancellation_token: CancellationToken,
}

impl JobRecord {
    pub fn new(identity: JobIdentity, payload: Arc<dyn Job>) -> Self {
        let now = Utc::now();
        Self {
            identity,
            status: JobStatus::Pending,
            payload,
            outcome: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            last_heartbeat_at: now,
            last_seen: Instant::now(),
            started: None,
            attempt_id: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Apply a state-machine edge. Returns false, leaving the record
    /// untouched, when the edge is not allowed.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        match next {
            JobStatus::Processing => {
                self.started_at = Some(Utc::now());
                self.started = Some(Instant::now());
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            JobStatus::Pending => {}
        }
        true
    }

    pub fn touch(&mut self) {
        self.last_heartbeat_at = Utc::now();
        self.last_seen = Instant::now();
    }

    pub fn run_time(&self) -> Option<Duration> {
        self.started.map(|started| started.elapsed())
    }
}

/// Point-in-time view of a job, as returned by `RequestQueue::status`.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub identity: JobIdentity,
    pub status: JobStatus,
    /// 1-based place in the pending queue; only set while pending
    pub position: Option<usize>,
    /// Rough time until the job starts; only set while pending
    pub estimated_wait: Option<Duration>,
    pub error_message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl JobStatusReport {
    pub(crate) fn from_record(record: &JobRecord) -> Self {
        Self {
            identity: record.identity.clone(),
            status: record.status,
            position: None,
            estimated_wait: None,
            error_message: record
                .outcome
                .as_ref()
                .and_then(|outcome| outcome.error())
                .map(str::to_string),
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            last_heartbeat_at: record.last_heartbeat_at,
        }
    }
}
