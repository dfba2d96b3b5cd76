//! Scan schedule records - cron-driven recurring full scans.
//!
//! The id-list columns are JSON arrays; an empty array means "all active"
//! for that dimension when the schedule fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A recurring full-scan definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSchedule {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Five-field cron expression
    pub cron_expression: String,
    /// Service areas to scan (empty = all active)
    pub service_area_ids: Vec<String>,
    /// Categories to scan (empty = all active)
    pub category_ids: Vec<String>,
    /// Engines to use (empty = all registered)
    pub engine_ids: Vec<String>,
    /// Grid side length
    pub grid_size: i64,
    /// Whether the schedule fires
    pub is_active: bool,
    /// Last firing time
    pub last_run_at: Option<DateTime<Utc>>,
    /// Next computed firing time, when known
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Input for creating a schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    /// Display name
    pub name: String,
    /// Five-field cron expression
    pub cron_expression: String,
    /// Service areas (empty = all active)
    pub service_area_ids: Vec<String>,
    /// Categories (empty = all active)
    pub category_ids: Vec<String>,
    /// Engines (empty = all registered)
    pub engine_ids: Vec<String>,
    /// Grid side length
    pub grid_size: i64,
}

fn ids_from_json(raw: &str) -> Result<Vec<String>, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn ids_to_json(ids: &[String]) -> Result<String, sqlx::Error> {
    serde_json::to_string(ids).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScanSchedule, sqlx::Error> {
    Ok(ScanSchedule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        cron_expression: row.try_get("cron_expression")?,
        service_area_ids: ids_from_json(row.try_get::<String, _>("service_area_ids")?.as_str())?,
        category_ids: ids_from_json(row.try_get::<String, _>("category_ids")?.as_str())?,
        engine_ids: ids_from_json(row.try_get::<String, _>("engine_ids")?.as_str())?,
        grid_size: row.try_get("grid_size")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
    })
}

/// Create a new schedule.
pub async fn create_schedule(
    pool: &Pool<Sqlite>,
    new: &NewSchedule,
) -> Result<ScanSchedule, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO scan_schedules (
            id, name, cron_expression, service_area_ids, category_ids, engine_ids,
            grid_size, is_active
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.cron_expression)
    .bind(ids_to_json(&new.service_area_ids)?)
    .bind(ids_to_json(&new.category_ids)?)
    .bind(ids_to_json(&new.engine_ids)?)
    .bind(new.grid_size)
    .execute(pool)
    .await?;

    Ok(ScanSchedule {
        id,
        name: new.name.clone(),
        cron_expression: new.cron_expression.clone(),
        service_area_ids: new.service_area_ids.clone(),
        category_ids: new.category_ids.clone(),
        engine_ids: new.engine_ids.clone(),
        grid_size: new.grid_size,
        is_active: true,
        last_run_at: None,
        next_run_at: None,
    })
}

/// Get a schedule by ID.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<ScanSchedule>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM scan_schedules WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// List all active schedules.
pub async fn list_active(pool: &Pool<Sqlite>) -> Result<Vec<ScanSchedule>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM scan_schedules WHERE is_active = 1 ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.iter().map(from_row).collect()
}

/// Stamp the last firing time.
pub async fn update_last_run(
    pool: &Pool<Sqlite>,
    id: &str,
    last_run_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE scan_schedules SET last_run_at = ? WHERE id = ?")
        .bind(last_run_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Stamp (or clear) the computed next firing time.
pub async fn update_next_run(
    pool: &Pool<Sqlite>,
    id: &str,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE scan_schedules SET next_run_at = ? WHERE id = ?")
        .bind(next_run_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Activate or deactivate a schedule.
pub async fn set_active(pool: &Pool<Sqlite>, id: &str, active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE scan_schedules SET is_active = ? WHERE id = ?")
        .bind(i64::from(active))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_round_trips_id_lists() {
        let db = setup_test_db().await;

        let created = create_schedule(
            db.pool(),
            &NewSchedule {
                name: "Nightly".to_string(),
                cron_expression: "0 3 * * *".to_string(),
                service_area_ids: vec!["a1".to_string(), "a2".to_string()],
                category_ids: vec![],
                engine_ids: vec!["bing_api".to_string()],
                grid_size: 7,
            },
        )
        .await
        .expect("create schedule");

        let read = get_by_id(db.pool(), &created.id)
            .await
            .expect("get")
            .expect("exists");

        assert_eq!(read.service_area_ids, vec!["a1", "a2"]);
        assert!(read.category_ids.is_empty());
        assert_eq!(read.engine_ids, vec!["bing_api"]);
        assert!(read.is_active);
        assert!(read.last_run_at.is_none());
    }

    #[tokio::test]
    async fn test_run_stamps() {
        let db = setup_test_db().await;

        let schedule = create_schedule(
            db.pool(),
            &NewSchedule {
                name: "Nightly".to_string(),
                cron_expression: "0 3 * * *".to_string(),
                service_area_ids: vec![],
                category_ids: vec![],
                engine_ids: vec![],
                grid_size: 7,
            },
        )
        .await
        .expect("create schedule");

        let now = Utc::now();
        update_last_run(db.pool(), &schedule.id, now)
            .await
            .expect("stamp last run");
        update_next_run(db.pool(), &schedule.id, Some(now + chrono::Duration::days(1)))
            .await
            .expect("stamp next run");

        let read = get_by_id(db.pool(), &schedule.id)
            .await
            .expect("get")
            .expect("exists");
        assert!(read.last_run_at.is_some());
        assert!(read.next_run_at.expect("next run") > now);
    }

    #[tokio::test]
    async fn test_list_active_excludes_disabled() {
        let db = setup_test_db().await;

        let a = create_schedule(
            db.pool(),
            &NewSchedule {
                name: "A".to_string(),
                cron_expression: "* * * * *".to_string(),
                service_area_ids: vec![],
                category_ids: vec![],
                engine_ids: vec![],
                grid_size: 3,
            },
        )
        .await
        .expect("create a");

        set_active(db.pool(), &a.id, false).await.expect("disable");

        let active = list_active(db.pool()).await.expect("list");
        assert!(active.is_empty());
    }
}
