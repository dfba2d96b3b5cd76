//! The uniform search result contract every engine produces.

use chrono::{DateTime, Utc};
use gridrank_core::{EngineId, GeoPoint, ResultType};
use serde::{Deserialize, Serialize};

/// A business listing parsed from a results page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBusiness {
    /// Display name as shown on the page
    pub name: String,
    /// Street address, when shown
    pub address: Option<String>,
    /// City, when shown or inferable
    pub city: Option<String>,
    /// State, when shown or inferable
    pub state: Option<String>,
    /// Raw phone string as shown
    pub phone: Option<String>,
    /// Website URL, when linked
    pub website: Option<String>,
    /// Listing latitude, when exposed
    pub lat: Option<f64>,
    /// Listing longitude, when exposed
    pub lng: Option<f64>,
    /// Star rating, when shown
    pub rating: Option<f64>,
    /// Review count, when shown
    pub review_count: Option<i64>,
    /// Google place identifier, when exposed
    pub google_place_id: Option<String>,
    /// Any other source-specific identifier
    pub source_id: Option<String>,
    /// Which page section the listing appeared in
    pub result_type: ResultType,
    /// 1-based position within that section's list
    pub rank_position: i64,
    /// Snippet or description text
    pub snippet: Option<String>,
}

/// An organic (non-listing) result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicResult {
    /// Result title
    pub title: String,
    /// Destination URL
    pub url: String,
    /// Snippet text
    pub snippet: Option<String>,
    /// 1-based position
    pub rank_position: i64,
}

/// Response diagnostics attached to every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// True when the provider answered with a CAPTCHA challenge
    pub captcha_detected: bool,
    /// Wall-clock time of the HTTP round trip
    pub response_time_ms: u64,
    /// Version tag of the parser that produced the listings
    pub parser_version: String,
    /// Whether the request went through a proxy
    pub proxy_used: bool,
}

/// Output of one engine search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Engine that produced the result
    pub engine_id: EngineId,
    /// Query text
    pub query: String,
    /// Grid coordinate the search simulated
    pub location: GeoPoint,
    /// When the search ran
    pub timestamp: DateTime<Utc>,
    /// Parsed business listings
    pub businesses: Vec<ParsedBusiness>,
    /// Parsed organic results
    pub organic_results: Vec<OrganicResult>,
    /// Response diagnostics
    pub metadata: SearchMetadata,
}

impl SearchResult {
    /// An empty result, used for CAPTCHA/block responses.
    #[must_use]
    pub fn empty(
        engine_id: EngineId,
        query: &str,
        location: GeoPoint,
        captcha_detected: bool,
        response_time_ms: u64,
    ) -> Self {
        Self {
            engine_id,
            query: query.to_string(),
            location,
            timestamp: Utc::now(),
            businesses: vec![],
            organic_results: vec![],
            metadata: SearchMetadata {
                captcha_detected,
                response_time_ms,
                parser_version: String::new(),
                proxy_used: false,
            },
        }
    }
}

/// What a backend parser extracts from one page.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Business listings in page order
    pub businesses: Vec<ParsedBusiness>,
    /// Organic results in page order
    pub organic_results: Vec<OrganicResult>,
    /// Version tag of the parser
    pub parser_version: &'static str,
}
