//! Error types for the scheduler module

use crate::error::AppError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// start() called while a sweep loop is active
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Interval rejected before the loop starts
    #[error("Invalid sweep interval: {0}")]
    InvalidInterval(String),

    /// A cycle task panicked or was cancelled
    #[error("Sweep cycle failed: {0}")]
    CycleFailed(String),
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidInterval(msg) => AppError::Configuration(msg),
            SchedulerError::AlreadyRunning => AppError::InvalidStateTransition(err.to_string()),
            SchedulerError::CycleFailed(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        SchedulerError::CycleFailed(err.to_string())
    }
}
