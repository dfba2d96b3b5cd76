//! Business categories and their keywords.
//!
//! Categories form a self-referential tree; each category owns a set of
//! keyword records that full scans expand into queries.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A business category, e.g. "Restaurants" or "Plumbers".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// URL-safe unique slug
    pub slug: String,
    /// Optional parent category
    pub parent_id: Option<String>,
    /// Whether the category participates in full scans
    pub is_active: bool,
}

/// A search keyword owned by a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    /// Unique identifier
    pub id: String,
    /// Owning category
    pub category_id: String,
    /// Query text, unique within the category
    pub text: String,
    /// Scan priority (higher first)
    pub priority: i64,
    /// Whether the keyword participates in full scans
    pub is_active: bool,
}

fn category_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        parent_id: row.try_get("parent_id")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
    })
}

fn keyword_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Keyword, sqlx::Error> {
    Ok(Keyword {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        text: row.try_get("text")?,
        priority: row.try_get("priority")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
    })
}

/// Create a new category.
pub async fn create_category(
    pool: &Pool<Sqlite>,
    name: &str,
    slug: &str,
    parent_id: Option<&str>,
) -> Result<Category, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO categories (id, name, slug, parent_id, is_active) VALUES (?, ?, ?, ?, 1)")
        .bind(&id)
        .bind(name)
        .bind(slug)
        .bind(parent_id)
        .execute(pool)
        .await?;

    Ok(Category {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        parent_id: parent_id.map(ToString::to_string),
        is_active: true,
    })
}

/// Get a category by ID.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Category>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(category_from_row).transpose()
}

/// List all active categories.
pub async fn list_active(pool: &Pool<Sqlite>) -> Result<Vec<Category>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM categories WHERE is_active = 1 ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.iter().map(category_from_row).collect()
}

/// Add a keyword to a category.
///
/// The `(category_id, text)` pair is unique; inserting a duplicate returns
/// the database constraint error.
pub async fn create_keyword(
    pool: &Pool<Sqlite>,
    category_id: &str,
    text: &str,
    priority: i64,
) -> Result<Keyword, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO keywords (id, category_id, text, priority, is_active) VALUES (?, ?, ?, ?, 1)",
    )
    .bind(&id)
    .bind(category_id)
    .bind(text)
    .bind(priority)
    .execute(pool)
    .await?;

    Ok(Keyword {
        id,
        category_id: category_id.to_string(),
        text: text.to_string(),
        priority,
        is_active: true,
    })
}

/// List a category's active keywords, highest priority first.
pub async fn list_active_keywords(
    pool: &Pool<Sqlite>,
    category_id: &str,
) -> Result<Vec<Keyword>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM keywords WHERE category_id = ? AND is_active = 1 ORDER BY priority DESC, text",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(keyword_from_row).collect()
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
    async fn test_category_tree() {
        let db = setup_test_db().await;

        let parent = create_category(db.pool(), "Home Services", "home-services", None)
            .await
            .expect("create parent");
        let child = create_category(db.pool(), "Plumbers", "plumbers", Some(&parent.id))
            .await
            .expect("create child");

        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
    }

    #[tokio::test]
    async fn test_slug_unique() {
        let db = setup_test_db().await;

        create_category(db.pool(), "Plumbers", "plumbers", None)
            .await
            .expect("create first");
        let dup = create_category(db.pool(), "Plumbers 2", "plumbers", None).await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_keyword_unique_within_category() {
        let db = setup_test_db().await;

        let cat = create_category(db.pool(), "Pizza", "pizza", None)
            .await
            .expect("create category");

        create_keyword(db.pool(), &cat.id, "pizza near me", 1)
            .await
            .expect("create keyword");
        let dup = create_keyword(db.pool(), &cat.id, "pizza near me", 2).await;
        assert!(dup.is_err());

        let other = create_category(db.pool(), "Pasta", "pasta", None)
            .await
            .expect("create other category");
        create_keyword(db.pool(), &other.id, "pizza near me", 1)
            .await
            .expect("same text allowed in another category");
    }

    #[tokio::test]
    async fn test_keywords_ordered_by_priority() {
        let db = setup_test_db().await;

        let cat = create_category(db.pool(), "Pizza", "pizza", None)
            .await
            .expect("create category");
        create_keyword(db.pool(), &cat.id, "pizza delivery", 1)
            .await
            .expect("create low");
        create_keyword(db.pool(), &cat.id, "best pizza", 5)
            .await
            .expect("create high");

        let keywords = list_active_keywords(db.pool(), &cat.id)
            .await
            .expect("list keywords");
        assert_eq!(keywords[0].text, "best pizza");
        assert_eq!(keywords[1].text, "pizza delivery");
    }
}
