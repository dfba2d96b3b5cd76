//! Review snapshot records - an append-only rating time series per business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A point-in-time rating observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    /// Unique identifier
    pub id: String,
    /// Business observed
    pub business_id: String,
    /// `google` or `bing`
    pub source: String,
    /// Rating in (0, 5]
    pub rating: f64,
    /// Review count at capture time
    pub review_count: i64,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ReviewSnapshot, sqlx::Error> {
    Ok(ReviewSnapshot {
        id: row.try_get("id")?,
        business_id: row.try_get("business_id")?,
        source: row.try_get("source")?,
        rating: row.try_get("rating")?,
        review_count: row.try_get("review_count")?,
        captured_at: row.try_get("captured_at")?,
    })
}

/// Append one snapshot.
pub async fn insert_snapshot(
    pool: &Pool<Sqlite>,
    business_id: &str,
    source: &str,
    rating: f64,
    review_count: i64,
) -> Result<ReviewSnapshot, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let captured_at = Utc::now();

    sqlx::query(
        "INSERT INTO review_snapshots (id, business_id, source, rating, review_count, captured_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(business_id)
    .bind(source)
    .bind(rating)
    .bind(review_count)
    .bind(captured_at)
    .execute(pool)
    .await?;

    Ok(ReviewSnapshot {
        id,
        business_id: business_id.to_string(),
        source: source.to_string(),
        rating,
        review_count,
        captured_at,
    })
}

/// A business's snapshots, newest first.
pub async fn list_by_business(
    pool: &Pool<Sqlite>,
    business_id: &str,
) -> Result<Vec<ReviewSnapshot>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM review_snapshots WHERE business_id = ? ORDER BY captured_at DESC",
    )
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Count snapshots recorded for a business.
pub async fn count_by_business(pool: &Pool<Sqlite>, business_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM review_snapshots WHERE business_id = ?")
        .bind(business_id)
        .fetch_one(pool)
        .await
}
