//! GridRank Database Layer
//!
//! Provides SQLite database access through SQLx. Migrations are embedded and
//! run on startup; data-access modules are free async functions over a shared
//! `Pool<Sqlite>`.
//!
//! # Design Principles
//!
//! - One module per table, returning typed row structs
//! - Timestamps are `chrono::DateTime<Utc>` stored as RFC 3339 text
//! - The `points_completed` counter only moves through a SQL increment,
//!   never a read-modify-write in the application
//! - Terminal scan transitions are guarded by `status IN ('queued','running')`
//!   so a terminal scan can never move backwards
//!
//! # Example
//!
//! ```ignore
//! use gridrank_db::Database;
//!
//! let db = Database::new("gridrank.db").await?;
//! db.run_migrations().await?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod businesses;
pub mod categories;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod review_snapshots;
pub mod scan_points;
pub mod scan_rankings;
pub mod scan_schedules;
pub mod scans;
pub mod service_areas;

pub use connection::Database;
pub use error::{DatabaseError, Result};
