//! Business records - the deduplicated entity store scans resolve into.
//!
//! Rows are created by the matcher on first sighting and merged on every
//! later sighting. `first_seen_at` never changes after creation;
//! `last_seen_at` advances on every match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A deduplicated business entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    /// Unique identifier
    pub id: String,
    /// Display name as first seen
    pub name: String,
    /// Matching key: lowercased, suffix-stripped, punctuation-free name
    pub normalized_name: String,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State
    pub state: Option<String>,
    /// ZIP code
    pub zip: Option<String>,
    /// Digits-only phone with country prefix
    pub phone: Option<String>,
    /// Website URL as parsed
    pub website: Option<String>,
    /// Bare registrable host of the website
    pub normalized_domain: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lng: Option<f64>,
    /// Google place identifier, unique across businesses
    pub google_place_id: Option<String>,
    /// Category assigned at first sighting
    pub category_id: Option<String>,
    /// Latest Google rating
    pub google_rating: Option<f64>,
    /// Latest Google review count
    pub google_review_count: Option<i64>,
    /// Latest Bing rating
    pub bing_rating: Option<f64>,
    /// Latest Bing review count
    pub bing_review_count: Option<i64>,
    /// Whether the owner has claimed the listing
    pub is_claimed: bool,
    /// First sighting time, immutable
    pub first_seen_at: DateTime<Utc>,
    /// Most recent sighting time
    pub last_seen_at: DateTime<Utc>,
}

/// Input for creating a business row.
#[derive(Debug, Clone, Default)]
pub struct NewBusiness {
    /// Display name
    pub name: String,
    /// Normalized matching key
    pub normalized_name: String,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State
    pub state: Option<String>,
    /// ZIP code
    pub zip: Option<String>,
    /// Normalized phone
    pub phone: Option<String>,
    /// Website URL
    pub website: Option<String>,
    /// Normalized website host
    pub normalized_domain: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lng: Option<f64>,
    /// Google place identifier
    pub google_place_id: Option<String>,
    /// Category
    pub category_id: Option<String>,
    /// Google rating
    pub google_rating: Option<f64>,
    /// Google review count
    pub google_review_count: Option<i64>,
    /// Bing rating
    pub bing_rating: Option<f64>,
    /// Bing review count
    pub bing_review_count: Option<i64>,
}

/// Fields merged into an existing business on a match.
///
/// Identity fields (`phone`, `website`, `normalized_domain`,
/// `google_place_id`, coordinates) only fill previously-NULL columns;
/// rating fields overwrite when present.
#[derive(Debug, Clone, Default)]
pub struct MatchMerge {
    /// Normalized phone (pass `None` for Bing engines)
    pub phone: Option<String>,
    /// Website URL
    pub website: Option<String>,
    /// Normalized website host
    pub normalized_domain: Option<String>,
    /// Google place identifier
    pub google_place_id: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lng: Option<f64>,
    /// Google rating refresh
    pub google_rating: Option<f64>,
    /// Google review count refresh
    pub google_review_count: Option<i64>,
    /// Bing rating refresh
    pub bing_rating: Option<f64>,
    /// Bing review count refresh
    pub bing_review_count: Option<i64>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Business, sqlx::Error> {
    Ok(Business {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        normalized_name: row.try_get("normalized_name")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip: row.try_get("zip")?,
        phone: row.try_get("phone")?,
        website: row.try_get("website")?,
        normalized_domain: row.try_get("normalized_domain")?,
        lat: row.try_get("lat")?,
        lng: row.try_get("lng")?,
        google_place_id: row.try_get("google_place_id")?,
        category_id: row.try_get("category_id")?,
        google_rating: row.try_get("google_rating")?,
        google_review_count: row.try_get("google_review_count")?,
        bing_rating: row.try_get("bing_rating")?,
        bing_review_count: row.try_get("bing_review_count")?,
        is_claimed: row.try_get::<i64, _>("is_claimed")? != 0,
        first_seen_at: row.try_get("first_seen_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
    })
}

/// Create a new business row.
///
/// # Errors
/// Returns `sqlx::Error` if the insert fails (including a duplicate
/// `google_place_id`).
pub async fn create_business(
    pool: &Pool<Sqlite>,
    new: &NewBusiness,
) -> Result<Business, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO businesses (
            id, name, normalized_name, address, city, state, zip, phone, website,
            normalized_domain, lat, lng, google_place_id, category_id,
            google_rating, google_review_count, bing_rating, bing_review_count,
            is_claimed, first_seen_at, last_seen_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.normalized_name)
    .bind(&new.address)
    .bind(&new.city)
    .bind(&new.state)
    .bind(&new.zip)
    .bind(&new.phone)
    .bind(&new.website)
    .bind(&new.normalized_domain)
    .bind(new.lat)
    .bind(new.lng)
    .bind(&new.google_place_id)
    .bind(&new.category_id)
    .bind(new.google_rating)
    .bind(new.google_review_count)
    .bind(new.bing_rating)
    .bind(new.bing_review_count)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_by_id(pool, &id)
        .await?
        .ok_or_else(|| sqlx::Error::RowNotFound)
}

/// Get a business by ID.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Business>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM businesses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Find a business by its Google place identifier.
pub async fn find_by_place_id(
    pool: &Pool<Sqlite>,
    place_id: &str,
) -> Result<Option<Business>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM businesses WHERE google_place_id = ?")
        .bind(place_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Find businesses by normalized phone.
pub async fn find_by_phone(
    pool: &Pool<Sqlite>,
    phone: &str,
) -> Result<Vec<Business>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM businesses WHERE phone = ? ORDER BY first_seen_at")
        .bind(phone)
        .fetch_all(pool)
        .await?;

    rows.iter().map(from_row).collect()
}

/// Find businesses sharing a normalized name.
pub async fn find_by_normalized_name(
    pool: &Pool<Sqlite>,
    normalized_name: &str,
) -> Result<Vec<Business>, sqlx::Error> {
    let rows =
        sqlx::query("SELECT * FROM businesses WHERE normalized_name = ? ORDER BY first_seen_at")
            .bind(normalized_name)
            .fetch_all(pool)
            .await?;

    rows.iter().map(from_row).collect()
}

/// Find a business by website host and city (case-insensitive city match).
pub async fn find_by_domain_and_city(
    pool: &Pool<Sqlite>,
    normalized_domain: &str,
    city: &str,
) -> Result<Option<Business>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT * FROM businesses WHERE normalized_domain = ? AND LOWER(city) = LOWER(?)
         ORDER BY first_seen_at LIMIT 1",
    )
    .bind(normalized_domain)
    .bind(city)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(from_row).transpose()
}

/// Merge sighting data into a matched business and advance `last_seen_at`.
pub async fn apply_match_merge(
    pool: &Pool<Sqlite>,
    id: &str,
    merge: &MatchMerge,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE businesses SET
            phone = COALESCE(phone, ?),
            website = COALESCE(website, ?),
            normalized_domain = COALESCE(normalized_domain, ?),
            google_place_id = COALESCE(google_place_id, ?),
            lat = COALESCE(lat, ?),
            lng = COALESCE(lng, ?),
            google_rating = COALESCE(?, google_rating),
            google_review_count = COALESCE(?, google_review_count),
            bing_rating = COALESCE(?, bing_rating),
            bing_review_count = COALESCE(?, bing_review_count),
            last_seen_at = ?
         WHERE id = ?",
    )
    .bind(&merge.phone)
    .bind(&merge.website)
    .bind(&merge.normalized_domain)
    .bind(&merge.google_place_id)
    .bind(merge.lat)
    .bind(merge.lng)
    .bind(merge.google_rating)
    .bind(merge.google_review_count)
    .bind(merge.bing_rating)
    .bind(merge.bing_review_count)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
