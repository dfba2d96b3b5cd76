//! Business entity resolution.
//!
//! Every parsed listing resolves to exactly one business row through a
//! cascade of match tiers; the first tier that hits wins. A hit merges
//! sighting data into the existing row and advances `last_seen_at`; a
//! miss creates a new row.
//!
//! Tier order is deliberate: a phone match across different coordinates
//! is a stronger duplicate signal than coincident names without a phone,
//! so the phone tier precedes the name-plus-proximity tier.

use crate::error::Result;
use gridrank_core::{
    haversine_miles, normalize_business_name, normalize_domain, normalize_phone, EngineId,
    GeoPoint,
};
use gridrank_db::businesses::{self, Business, MatchMerge, NewBusiness};
use gridrank_db::Database;
use gridrank_engine::ParsedBusiness;
use strsim::levenshtein;

/// Coordinates closer than this (≈50 m) count as the same place.
const NAME_PROXIMITY_MILES: f64 = 0.031;

/// Maximum Levenshtein distance between normalized names for the
/// phone-plus-fuzzy-name tier.
const MAX_NAME_EDIT_DISTANCE: usize = 3;

/// Which tier resolved a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Exact Google place-id equality
    PlaceId,
    /// Normalized phone equality
    Phone,
    /// Same normalized name within 50 m
    NameProximity,
    /// Same phone with near-identical name
    PhoneFuzzyName,
    /// Same website host in the same city
    DomainCity,
    /// No tier hit; a new business was created
    Created,
}

impl MatchType {
    /// The confidence score the tier carries.
    #[must_use]
    pub fn confidence(&self) -> u8 {
        match self {
            Self::PlaceId => 100,
            Self::NameProximity => 95,
            Self::Phone => 90,
            Self::PhoneFuzzyName => 85,
            Self::DomainCity => 80,
            Self::Created => 0,
        }
    }
}

/// Outcome of resolving one parsed listing.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// The business the listing resolved to
    pub business_id: String,
    /// Confidence in [0, 100]
    pub confidence: u8,
    /// Which tier hit
    pub match_type: MatchType,
    /// True when a new business row was created
    pub created_new: bool,
}

/// Deduplicating resolver over the business store.
#[derive(Clone)]
pub struct BusinessMatcher {
    db: Database,
}

impl BusinessMatcher {
    /// Create a matcher over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve a parsed listing to a business, creating one if no tier
    /// matches.
    pub async fn resolve(
        &self,
        parsed: &ParsedBusiness,
        engine_id: &EngineId,
        category_id: Option<&str>,
    ) -> Result<MatchOutcome> {
        let pool = self.db.pool();

        let normalized_name = normalize_business_name(&parsed.name);
        let normalized_phone = parsed.phone.as_deref().and_then(normalize_phone);
        let normalized_domain = parsed.website.as_deref().and_then(normalize_domain);

        // Tier 1: place-id equality
        if let Some(place_id) = &parsed.google_place_id {
            if let Some(existing) = businesses::find_by_place_id(pool, place_id).await? {
                return self
                    .merge_hit(existing, parsed, engine_id, MatchType::PlaceId, &normalized_phone, &normalized_domain)
                    .await;
            }
        }

        // Tier 2: normalized phone equality
        if let Some(phone) = &normalized_phone {
            if let Some(existing) = businesses::find_by_phone(pool, phone).await?.into_iter().next()
            {
                return self
                    .merge_hit(existing, parsed, engine_id, MatchType::Phone, &normalized_phone, &normalized_domain)
                    .await;
            }
        }

        // Tier 3: same normalized name within 50 m
        if let (Some(lat), Some(lng)) = (parsed.lat, parsed.lng) {
            let candidates = businesses::find_by_normalized_name(pool, &normalized_name).await?;
            let here = GeoPoint::new(lat, lng);
            for candidate in candidates {
                if let (Some(c_lat), Some(c_lng)) = (candidate.lat, candidate.lng) {
                    if haversine_miles(here, GeoPoint::new(c_lat, c_lng)) < NAME_PROXIMITY_MILES {
                        return self
                            .merge_hit(candidate, parsed, engine_id, MatchType::NameProximity, &normalized_phone, &normalized_domain)
                            .await;
                    }
                }
            }
        }

        // Tier 3.5: same phone with near-identical name
        if let Some(phone) = &normalized_phone {
            let candidates = businesses::find_by_phone(pool, phone).await?;
            for candidate in candidates {
                if levenshtein(&candidate.normalized_name, &normalized_name)
                    <= MAX_NAME_EDIT_DISTANCE
                {
                    return self
                        .merge_hit(candidate, parsed, engine_id, MatchType::PhoneFuzzyName, &normalized_phone, &normalized_domain)
                        .await;
                }
            }
        }

        // Tier 4: same website host in the same city
        if let (Some(domain), Some(city)) = (&normalized_domain, &parsed.city) {
            if let Some(existing) = businesses::find_by_domain_and_city(pool, domain, city).await? {
                return self
                    .merge_hit(existing, parsed, engine_id, MatchType::DomainCity, &normalized_phone, &normalized_domain)
                    .await;
            }
        }

        // Tier 5: first sighting
        let (google_rating, google_review_count, bing_rating, bing_review_count) =
            route_ratings(engine_id, parsed.rating, parsed.review_count);

        let created = businesses::create_business(
            pool,
            &NewBusiness {
                name: parsed.name.clone(),
                normalized_name,
                address: parsed.address.clone(),
                city: parsed.city.clone(),
                state: parsed.state.clone(),
                zip: None,
                phone: normalized_phone,
                website: parsed.website.clone(),
                normalized_domain,
                lat: parsed.lat,
                lng: parsed.lng,
                google_place_id: parsed.google_place_id.clone(),
                category_id: category_id.map(ToString::to_string),
                google_rating,
                google_review_count,
                bing_rating,
                bing_review_count,
            },
        )
        .await?;

        tracing::debug!(business_id = %created.id, name = %created.name, "created business");

        Ok(MatchOutcome {
            business_id: created.id,
            confidence: MatchType::Created.confidence(),
            match_type: MatchType::Created,
            created_new: true,
        })
    }

    async fn merge_hit(
        &self,
        existing: Business,
        parsed: &ParsedBusiness,
        engine_id: &EngineId,
        match_type: MatchType,
        normalized_phone: &Option<String>,
        normalized_domain: &Option<String>,
    ) -> Result<MatchOutcome> {
        let (google_rating, google_review_count, bing_rating, bing_review_count) =
            route_ratings(engine_id, parsed.rating, parsed.review_count);

        // Bing phone data is unreliable; never merge it
        let phone = if engine_id.is_bing() {
            None
        } else {
            normalized_phone.clone()
        };

        businesses::apply_match_merge(
            self.db.pool(),
            &existing.id,
            &MatchMerge {
                phone,
                website: parsed.website.clone(),
                normalized_domain: normalized_domain.clone(),
                google_place_id: parsed.google_place_id.clone(),
                lat: parsed.lat,
                lng: parsed.lng,
                google_rating,
                google_review_count,
                bing_rating,
                bing_review_count,
            },
        )
        .await?;

        Ok(MatchOutcome {
            business_id: existing.id,
            confidence: match_type.confidence(),
            match_type,
            created_new: false,
        })
    }
}

/// Route a sighting's rating into the engine-specific columns.
fn route_ratings(
    engine_id: &EngineId,
    rating: Option<f64>,
    review_count: Option<i64>,
) -> (Option<f64>, Option<i64>, Option<f64>, Option<i64>) {
    if engine_id.is_bing() {
        (None, None, rating, review_count)
    } else {
        (rating, review_count, None, None)
    }
}
