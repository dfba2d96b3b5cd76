//! Google Maps direct-HTTP backend.
//!
//! The Maps page is a JavaScript application; the static shell served over
//! plain HTTP rarely contains listings. This backend extracts what little
//! the shell exposes and otherwise returns an empty page - scans over it
//! complete with zero rankings rather than failing.

use crate::engine::{SearchBackend, SearchRequest};
use crate::error::Result;
use crate::result::{ParsedBusiness, ParsedPage};
use gridrank_core::ResultType;
use scraper::{Html, Selector};

const PARSER_VERSION: &str = "google-maps-static/1";

/// Backend for Google Maps search over direct HTTP.
#[derive(Debug, Default)]
pub struct GoogleMapsBackend;

impl GoogleMapsBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SearchBackend for GoogleMapsBackend {
    fn request_domain(&self) -> &'static str {
        "www.google.com"
    }

    fn referer(&self) -> Option<&'static str> {
        Some("https://www.google.com/")
    }

    fn build_request(
        &self,
        client: &reqwest::Client,
        request: &SearchRequest,
    ) -> reqwest::RequestBuilder {
        let query = request.query.replace(' ', "+");
        let url = format!(
            "https://www.google.com/maps/search/{query}/@{:.7},{:.7},14z",
            request.point.lat, request.point.lng
        );
        client.get(url).query(&[("hl", "en")])
    }

    fn parse(&self, body: &str, _request: &SearchRequest) -> Result<ParsedPage> {
        let document = Html::parse_document(body);
        let mut page = ParsedPage {
            parser_version: PARSER_VERSION,
            ..ParsedPage::default()
        };

        // The shell occasionally includes server-rendered place anchors
        let anchor_sel = Selector::parse("a[href*='/maps/place/']").expect("valid selector");
        let mut position = 0i64;
        for anchor in document.select(&anchor_sel) {
            let name = anchor
                .value()
                .attr("aria-label")
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ToString::to_string);
            let Some(name) = name else { continue };

            position += 1;
            page.businesses.push(ParsedBusiness {
                name,
                address: None,
                city: None,
                state: None,
                phone: None,
                website: None,
                lat: None,
                lng: None,
                rating: None,
                review_count: None,
                google_place_id: None,
                source_id: anchor.value().attr("href").map(ToString::to_string),
                result_type: ResultType::Maps,
                rank_position: position,
                snippet: None,
            });
        }

        Ok(page)
    }
}
