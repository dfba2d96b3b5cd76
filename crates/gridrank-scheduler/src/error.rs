//! Scheduler error types.

use thiserror::Error;

/// Errors raised by the scan scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron runtime failed
    #[error("cron scheduler error: {0}")]
    Cron(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// A schedule query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The scheduler has not been started
    #[error("scheduler is not running")]
    NotStarted,
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
