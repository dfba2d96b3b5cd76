//! Bing Web Search API backend - the one sanctioned API in the default set.

use crate::engine::{SearchBackend, SearchRequest};
use crate::error::{EngineError, Result};
use crate::result::{OrganicResult, ParsedBusiness, ParsedPage};
use gridrank_core::{EngineId, ResultType};
use serde::Deserialize;

const PARSER_VERSION: &str = "bing-api-v7/1";

/// Backend for `api.bing.microsoft.com/v7.0/search`.
#[derive(Debug)]
pub struct BingApiBackend {
    api_key: String,
}

impl BingApiBackend {
    /// Create the backend with its subscription key.
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BingResponse {
    places: Option<BingPlaces>,
    #[serde(rename = "webPages")]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingPlaces {
    value: Vec<BingPlace>,
}

#[derive(Debug, Deserialize)]
struct BingPlace {
    name: String,
    id: Option<String>,
    url: Option<String>,
    telephone: Option<String>,
    address: Option<BingAddress>,
    geo: Option<BingGeo>,
    #[serde(rename = "aggregateRating")]
    aggregate_rating: Option<BingRating>,
}

#[derive(Debug, Deserialize)]
struct BingAddress {
    #[serde(rename = "streetAddress")]
    street_address: Option<String>,
    #[serde(rename = "addressLocality")]
    address_locality: Option<String>,
    #[serde(rename = "addressRegion")]
    address_region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BingGeo {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct BingRating {
    #[serde(rename = "ratingValue")]
    rating_value: Option<f64>,
    #[serde(rename = "reviewCount")]
    review_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    value: Vec<BingWebPage>,
}

#[derive(Debug, Deserialize)]
struct BingWebPage {
    name: String,
    url: String,
    snippet: Option<String>,
}

impl SearchBackend for BingApiBackend {
    fn request_domain(&self) -> &'static str {
        "api.bing.microsoft.com"
    }

    fn build_request(
        &self,
        client: &reqwest::Client,
        request: &SearchRequest,
    ) -> reqwest::RequestBuilder {
        let query = match (&request.city, &request.state) {
            (Some(city), Some(state)) => format!("{} in {city}, {state}", request.query),
            _ => request.query.clone(),
        };

        client
            .get("https://api.bing.microsoft.com/v7.0/search")
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query.as_str()), ("mkt", "en-US"), ("count", "20")])
    }

    fn parse(&self, body: &str, _request: &SearchRequest) -> Result<ParsedPage> {
        let response: BingResponse =
            serde_json::from_str(body).map_err(|e| EngineError::Parse {
                engine_id: EngineId::new("bing_api").expect("valid engine id"),
                reason: format!("invalid JSON: {e}"),
            })?;

        let mut page = ParsedPage {
            parser_version: PARSER_VERSION,
            ..ParsedPage::default()
        };

        if let Some(places) = response.places {
            for (i, place) in places.value.into_iter().enumerate() {
                let (rating, review_count) = place
                    .aggregate_rating
                    .map_or((None, None), |r| (r.rating_value, r.review_count));

                page.businesses.push(ParsedBusiness {
                    name: place.name,
                    address: place
                        .address
                        .as_ref()
                        .and_then(|a| a.street_address.clone()),
                    city: place
                        .address
                        .as_ref()
                        .and_then(|a| a.address_locality.clone()),
                    state: place.address.as_ref().and_then(|a| a.address_region.clone()),
                    phone: place.telephone,
                    website: place.url,
                    lat: place.geo.as_ref().map(|g| g.latitude),
                    lng: place.geo.as_ref().map(|g| g.longitude),
                    rating,
                    review_count,
                    google_place_id: None,
                    source_id: place.id,
                    result_type: ResultType::LocalPack,
                    rank_position: i64::try_from(i).unwrap_or(i64::MAX - 1) + 1,
                    snippet: None,
                });
            }
        }

        if let Some(web_pages) = response.web_pages {
            for (i, web_page) in web_pages.value.into_iter().enumerate() {
                page.organic_results.push(OrganicResult {
                    title: web_page.name,
                    url: web_page.url,
                    snippet: web_page.snippet,
                    rank_position: i64::try_from(i).unwrap_or(i64::MAX - 1) + 1,
                });
            }
        }

        Ok(page)
    }
}
