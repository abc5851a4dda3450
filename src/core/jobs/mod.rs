//! Job scheduling, deduplication, result caching and cleanup
//!
//! This module contains the request queue and the components it is built
//! from: job records, the identity index, the worker scheduler, the result
//! cache, heartbeat tracking and the cleanup sweeper.

pub mod cache;
pub mod heartbeat;
pub mod identity;
pub mod job;
pub mod request_queue;
mod scheduler;
mod state;
pub mod stats;
pub mod sweeper;

// Re-export commonly used types
pub use identity::JobIdentity;
pub use job::{job_fn, FnJob, Job, JobContext, JobOutcome, JobStatus, JobStatusReport};
pub use request_queue::RequestQueue;
pub use stats::QueueStats;
pub use sweeper::SweepReport;
