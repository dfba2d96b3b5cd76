//! Database error types.

use thiserror::Error;

/// Errors raised by the database layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create the database
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration failed
    #[error("migration failed: {0}")]
    Migration(String),

    /// Query execution failed
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
