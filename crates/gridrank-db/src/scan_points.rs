//! Scan point records - one grid coordinate within a scan.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Lifecycle status of a scan point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    /// Not yet executed
    Pending,
    /// Search ran and rankings were recorded (possibly zero)
    Completed,
    /// Search raised an error; no rankings
    Failed,
}

impl PointStatus {
    /// Stable string form used in persistence.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Result<Self, sqlx::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(sqlx::Error::Decode(
                format!("unknown point status '{other}'").into(),
            )),
        }
    }
}

/// One coordinate of a scan's grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Unique identifier
    pub id: String,
    /// Owning scan
    pub scan_id: String,
    /// Row index, 0 = north edge
    pub grid_row: i64,
    /// Column index, 0 = west edge
    pub grid_col: i64,
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
    /// Lifecycle status
    pub status: PointStatus,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScanPoint, sqlx::Error> {
    Ok(ScanPoint {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        grid_row: row.try_get("grid_row")?,
        grid_col: row.try_get("grid_col")?,
        lat: row.try_get("lat")?,
        lng: row.try_get("lng")?,
        status: PointStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
    })
}

/// Insert one pending point.
pub async fn create_point(
    pool: &Pool<Sqlite>,
    scan_id: &str,
    grid_row: i64,
    grid_col: i64,
    lat: f64,
    lng: f64,
) -> Result<ScanPoint, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO scan_points (id, scan_id, grid_row, grid_col, lat, lng, status)
         VALUES (?, ?, ?, ?, ?, ?, 'pending')",
    )
    .bind(&id)
    .bind(scan_id)
    .bind(grid_row)
    .bind(grid_col)
    .bind(lat)
    .bind(lng)
    .execute(pool)
    .await?;

    Ok(ScanPoint {
        id,
        scan_id: scan_id.to_string(),
        grid_row,
        grid_col,
        lat,
        lng,
        status: PointStatus::Pending,
    })
}

/// Get a point by ID.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<ScanPoint>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM scan_points WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// All points of a scan, grid order.
pub async fn list_by_scan(pool: &Pool<Sqlite>, scan_id: &str) -> Result<Vec<ScanPoint>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM scan_points WHERE scan_id = ? ORDER BY grid_row, grid_col")
        .bind(scan_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(from_row).collect()
}

/// Points of a scan still awaiting execution.
pub async fn list_pending(pool: &Pool<Sqlite>, scan_id: &str) -> Result<Vec<ScanPoint>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM scan_points WHERE scan_id = ? AND status = 'pending'
         ORDER BY grid_row, grid_col",
    )
    .bind(scan_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Set a point's terminal status.
pub async fn set_status(
    pool: &Pool<Sqlite>,
    id: &str,
    status: PointStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE scan_points SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
