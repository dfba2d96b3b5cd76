//! Scan records - one geo-grid scan of a (area, keyword, engine) combination.
//!
//! Status moves forward only: `queued → running → {completed|failed|cancelled}`.
//! Every terminal transition is guarded by `status IN ('queued','running')` so
//! a finished scan can never be reopened, and the point counter only moves
//! through a SQL increment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Lifecycle status of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Created but not yet queued
    Pending,
    /// Persisted with tasks queued
    Queued,
    /// Tasks are executing
    Running,
    /// All points accounted for
    Completed,
    /// Terminal failure
    Failed,
    /// Administratively cancelled
    Cancelled,
}

impl ScanStatus {
    /// Stable string form used in persistence.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Result<Self, sqlx::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(sqlx::Error::Decode(
                format!("unknown scan status '{other}'").into(),
            )),
        }
    }

    /// True for `completed`, `failed` and `cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A geo-grid scan row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    /// Unique identifier
    pub id: String,
    /// Service area being scanned
    pub service_area_id: String,
    /// Category the keyword belongs to
    pub category_id: String,
    /// Query keyword
    pub keyword: String,
    /// Engine executing the scan
    pub engine_id: String,
    /// Grid side length
    pub grid_size: i64,
    /// Grid radius in miles
    pub radius_miles: f64,
    /// Lifecycle status
    pub status: ScanStatus,
    /// Total points (`grid_size²`)
    pub points_total: i64,
    /// Points completed or failed so far
    pub points_completed: i64,
    /// Failure detail, when terminal with an error
    pub error_message: Option<String>,
    /// When a schedule requested the scan
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When the scan reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Row creation time
    pub created_at: DateTime<Utc>,
}

/// Input for creating a scan row.
#[derive(Debug, Clone)]
pub struct NewScan {
    /// Service area
    pub service_area_id: String,
    /// Category
    pub category_id: String,
    /// Query keyword
    pub keyword: String,
    /// Engine
    pub engine_id: String,
    /// Grid side length
    pub grid_size: i64,
    /// Grid radius in miles
    pub radius_miles: f64,
    /// Schedule request time, when scheduler-driven
    pub scheduled_at: Option<DateTime<Utc>>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Scan, sqlx::Error> {
    Ok(Scan {
        id: row.try_get("id")?,
        service_area_id: row.try_get("service_area_id")?,
        category_id: row.try_get("category_id")?,
        keyword: row.try_get("keyword")?,
        engine_id: row.try_get("engine_id")?,
        grid_size: row.try_get("grid_size")?,
        radius_miles: row.try_get("radius_miles")?,
        status: ScanStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        points_total: row.try_get("points_total")?,
        points_completed: row.try_get("points_completed")?,
        error_message: row.try_get("error_message")?,
        scheduled_at: row.try_get("scheduled_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Create a scan in `queued` state with `points_total = grid_size²`.
pub async fn create_scan(pool: &Pool<Sqlite>, new: &NewScan) -> Result<Scan, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let points_total = new.grid_size * new.grid_size;

    sqlx::query(
        "INSERT INTO scans (
            id, service_area_id, category_id, keyword, engine_id, grid_size,
            radius_miles, status, points_total, points_completed, scheduled_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'queued', ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(&new.service_area_id)
    .bind(&new.category_id)
    .bind(&new.keyword)
    .bind(&new.engine_id)
    .bind(new.grid_size)
    .bind(new.radius_miles)
    .bind(points_total)
    .bind(new.scheduled_at)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(Scan {
        id,
        service_area_id: new.service_area_id.clone(),
        category_id: new.category_id.clone(),
        keyword: new.keyword.clone(),
        engine_id: new.engine_id.clone(),
        grid_size: new.grid_size,
        radius_miles: new.radius_miles,
        status: ScanStatus::Queued,
        points_total,
        points_completed: 0,
        error_message: None,
        scheduled_at: new.scheduled_at,
        started_at: None,
        completed_at: None,
        created_at,
    })
}

/// Get a scan by ID.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Scan>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM scans WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Move a queued scan to `running` and stamp `started_at`.
pub async fn mark_running(pool: &Pool<Sqlite>, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE scans SET status = 'running', started_at = COALESCE(started_at, ?)
         WHERE id = ? AND status IN ('pending', 'queued', 'running')",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Atomically count one more finished point (completed or failed).
///
/// Expressed as a SQL increment so concurrent task handlers never lose
/// updates.
pub async fn increment_points_completed(pool: &Pool<Sqlite>, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE scans SET points_completed = points_completed + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Transition a scan to a terminal state.
///
/// Only `queued` or `running` scans move; a scan already terminal keeps its
/// state, preserving status monotonicity. Returns whether a row changed.
pub async fn finalize(
    pool: &Pool<Sqlite>,
    id: &str,
    status: ScanStatus,
    error_message: Option<&str>,
) -> Result<bool, sqlx::Error> {
    debug_assert!(status.is_terminal());

    let result = sqlx::query(
        "UPDATE scans SET status = ?, completed_at = ?, error_message = ?
         WHERE id = ? AND status IN ('pending', 'queued', 'running')",
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Batch-transition scans to a terminal state.
///
/// Used by the batch monitor: one statement per terminal status, guarded the
/// same way as [`finalize`].
pub async fn finalize_batch(
    pool: &Pool<Sqlite>,
    ids: &[String],
    status: ScanStatus,
    error_message: Option<&str>,
) -> Result<u64, sqlx::Error> {
    debug_assert!(status.is_terminal());

    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "UPDATE scans SET status = ?, completed_at = ?, error_message = ?
         WHERE id IN ({placeholders}) AND status IN ('pending', 'queued', 'running')"
    );

    let mut query = sqlx::query(&sql)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(error_message);
    for id in ids {
        query = query.bind(id);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Fetch the still-non-terminal scans among `ids`.
pub async fn list_non_terminal(
    pool: &Pool<Sqlite>,
    ids: &[String],
) -> Result<Vec<Scan>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT * FROM scans WHERE id IN ({placeholders})
         AND status IN ('pending', 'queued', 'running')"
    );

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(from_row).collect()
}

/// Scans left `queued` or `running` by a previous process, oldest first.
pub async fn list_orphaned(pool: &Pool<Sqlite>) -> Result<Vec<Scan>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM scans WHERE status IN ('queued', 'running') ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Administratively cancel a scan.
pub async fn cancel(pool: &Pool<Sqlite>, id: &str) -> Result<bool, sqlx::Error> {
    finalize(pool, id, ScanStatus::Cancelled, None).await
}
