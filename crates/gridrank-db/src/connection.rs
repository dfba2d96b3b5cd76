//! Database connection management.
//!
//! Wraps an SQLx SQLite pool with sensible defaults: foreign keys enabled,
//! WAL journaling for file databases, and automatic file creation.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Shared SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Pass `:memory:` for an in-memory database.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(path)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .foreign_keys(true)
            .create_if_missing(true);

        // An in-memory SQLite database exists per connection; keep a single
        // connection so every query sees the same schema.
        let max_connections = if path.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to create pool: {e}")))?;

        tracing::info!(path = %path, "database pool created");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run all pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        crate::migrations::run_migrations(&self.pool).await
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}
