//! Scan ranking records - one business at one rank at one grid point.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A ranked appearance of a business at a grid point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRanking {
    /// Unique identifier
    pub id: String,
    /// Grid point the ranking was observed at
    pub scan_point_id: String,
    /// Resolved business
    pub business_id: String,
    /// 1-based position within the result list
    pub rank_position: i64,
    /// Where on the page the listing appeared
    pub result_type: String,
    /// Optional snippet text
    pub snippet: Option<String>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScanRanking, sqlx::Error> {
    Ok(ScanRanking {
        id: row.try_get("id")?,
        scan_point_id: row.try_get("scan_point_id")?,
        business_id: row.try_get("business_id")?,
        rank_position: row.try_get("rank_position")?,
        result_type: row.try_get("result_type")?,
        snippet: row.try_get("snippet")?,
    })
}

/// Record a ranking observation.
pub async fn insert_ranking(
    pool: &Pool<Sqlite>,
    scan_point_id: &str,
    business_id: &str,
    rank_position: i64,
    result_type: &str,
    snippet: Option<&str>,
) -> Result<ScanRanking, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO scan_rankings (id, scan_point_id, business_id, rank_position, result_type, snippet)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(scan_point_id)
    .bind(business_id)
    .bind(rank_position)
    .bind(result_type)
    .bind(snippet)
    .execute(pool)
    .await?;

    Ok(ScanRanking {
        id,
        scan_point_id: scan_point_id.to_string(),
        business_id: business_id.to_string(),
        rank_position,
        result_type: result_type.to_string(),
        snippet: snippet.map(ToString::to_string),
    })
}

/// Rankings at one grid point, ordered by position.
pub async fn list_by_point(
    pool: &Pool<Sqlite>,
    scan_point_id: &str,
) -> Result<Vec<ScanRanking>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM scan_rankings WHERE scan_point_id = ? ORDER BY rank_position",
    )
    .bind(scan_point_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Count rankings recorded for a whole scan.
pub async fn count_by_scan(pool: &Pool<Sqlite>, scan_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM scan_rankings r
         JOIN scan_points p ON p.id = r.scan_point_id
         WHERE p.scan_id = ?",
    )
    .bind(scan_id)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{businesses, categories, scan_points, scans, service_areas, Database};

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_insert_and_order() {
        let db = setup_test_db().await;

        let area = service_areas::create_service_area(db.pool(), "A", "FL", 26.0, -80.0, 1.0)
            .await
            .expect("create area");
        let cat = categories::create_category(db.pool(), "Pizza", "pizza", None)
            .await
            .expect("create category");
        let scan = scans::create_scan(
            db.pool(),
            &scans::NewScan {
                service_area_id: area.id,
                category_id: cat.id,
                keyword: "pizza".to_string(),
                engine_id: "bing_api".to_string(),
                grid_size: 3,
                radius_miles: 1.0,
                scheduled_at: None,
            },
        )
        .await
        .expect("create scan");
        let point = scan_points::create_point(db.pool(), &scan.id, 0, 0, 26.0, -80.0)
            .await
            .expect("create point");
        let biz = businesses::create_business(
            db.pool(),
            &businesses::NewBusiness {
                name: "Joe's".to_string(),
                normalized_name: "joes".to_string(),
                ..businesses::NewBusiness::default()
            },
        )
        .await
        .expect("create business");

        insert_ranking(db.pool(), &point.id, &biz.id, 2, "local_pack", None)
            .await
            .expect("insert second");
        insert_ranking(db.pool(), &point.id, &biz.id, 1, "local_pack", Some("Best pizza"))
            .await
            .expect("insert first");

        let rankings = list_by_point(db.pool(), &point.id).await.expect("list");
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].rank_position, 1);
        assert_eq!(rankings[0].snippet.as_deref(), Some("Best pizza"));

        assert_eq!(count_by_scan(db.pool(), &scan.id).await.expect("count"), 2);
    }
}
