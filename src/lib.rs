//! Seatwatch - train seat availability lookups behind an in-process
//! request queue.
//!
//! Lookups are expensive and hit a rate-limited upstream, so every search is
//! submitted to a [`RequestQueue`] that deduplicates identical requests,
//! runs a bounded number at a time with a cooldown between starts, caches
//! results, and reclaims jobs whose callers stopped sending heartbeats.

pub mod config;
pub mod core;
pub mod error;
pub mod seats;

// Re-export commonly used types
pub use crate::core::jobs::{
    Job, JobContext, JobIdentity, JobOutcome, JobStatus, JobStatusReport, QueueStats,
    RequestQueue, SweepReport,
};
pub use config::{AppConfiguration, QueueConfig};
pub use error::{AppError, Result};
