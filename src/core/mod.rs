//! Core runtime pieces: structured logging and the job subsystem.

pub mod jobs;
pub mod logging;
