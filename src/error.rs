use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out after {waited:?} waiting for job {identity}")]
    TimeoutError { identity: String, waited: Duration },

    #[error("Job {0} was cancelled")]
    Cancelled(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// True for the "job may still be running" outcome of `wait`.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::TimeoutError { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(format!("JSON error: {}", err))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(err: std::num::ParseIntError) -> Self {
        AppError::ConfigError(format!("Invalid integer: {}", err))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(err: std::num::ParseFloatError) -> Self {
        AppError::ConfigError(format!("Invalid number: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            AppError::JobFailed("Job panicked during execution".to_string())
        } else {
            AppError::InternalServerError(format!("Job task was aborted: {}", err))
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
