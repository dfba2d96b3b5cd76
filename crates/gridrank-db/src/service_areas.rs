//! Service area records - the geographic regions scans cover.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A geographic service area with a scan grid center and radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceArea {
    /// Unique identifier
    pub id: String,
    /// Display name, e.g. "Boca Raton"
    pub name: String,
    /// Two-letter state code
    pub state: String,
    /// Grid center latitude
    pub center_lat: f64,
    /// Grid center longitude
    pub center_lng: f64,
    /// Half the grid side, in miles
    pub radius_miles: f64,
    /// Whether the area participates in full scans
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceArea, sqlx::Error> {
    Ok(ServiceArea {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        state: row.try_get("state")?,
        center_lat: row.try_get("center_lat")?,
        center_lng: row.try_get("center_lng")?,
        radius_miles: row.try_get("radius_miles")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

/// Create a new service area.
///
/// # Errors
/// Returns `sqlx::Error` if the insert fails.
pub async fn create_service_area(
    pool: &Pool<Sqlite>,
    name: &str,
    state: &str,
    center_lat: f64,
    center_lng: f64,
    radius_miles: f64,
) -> Result<ServiceArea, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO service_areas (id, name, state, center_lat, center_lng, radius_miles, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(state)
    .bind(center_lat)
    .bind(center_lng)
    .bind(radius_miles)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(ServiceArea {
        id,
        name: name.to_string(),
        state: state.to_string(),
        center_lat,
        center_lng,
        radius_miles,
        is_active: true,
        created_at,
    })
}

/// Get a service area by ID.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<ServiceArea>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM service_areas WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// List all active service areas.
pub async fn list_active(pool: &Pool<Sqlite>) -> Result<Vec<ServiceArea>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM service_areas WHERE is_active = 1 ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.iter().map(from_row).collect()
}

/// Activate or deactivate a service area.
pub async fn set_active(pool: &Pool<Sqlite>, id: &str, active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE service_areas SET is_active = ? WHERE id = ?")
        .bind(i64::from(active))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
