//! Scanner error types.

use thiserror::Error;

/// Errors raised by the scan pipeline.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A request referenced a missing or inactive entity, or an
    /// out-of-range parameter. Nothing was persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// A database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The database layer failed outside a query
    #[error(transparent)]
    Db(#[from] gridrank_db::DatabaseError),

    /// An engine operation failed
    #[error(transparent)]
    Engine(#[from] gridrank_engine::EngineError),

    /// A core validation failed
    #[error(transparent)]
    Core(#[from] gridrank_core::CoreError),
}

/// Result type for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
