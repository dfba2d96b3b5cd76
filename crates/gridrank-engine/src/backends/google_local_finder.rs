//! Google local finder backend (`tbm=lcl`): the expanded map-anchored list.

use crate::backends::{parse_rating, parse_review_count};
use crate::engine::{SearchBackend, SearchRequest};
use crate::error::Result;
use crate::result::{ParsedBusiness, ParsedPage};
use crate::stealth::{build_canonical_name, encode_uule};
use gridrank_core::ResultType;
use scraper::{Html, Selector};

const PARSER_VERSION: &str = "google-local-finder/1";

/// Backend for the Google local finder page.
#[derive(Debug, Default)]
pub struct GoogleLocalFinderBackend;

impl GoogleLocalFinderBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SearchBackend for GoogleLocalFinderBackend {
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
        let mut params = vec![
            ("q".to_string(), request.query.clone()),
            ("tbm".to_string(), "lcl".to_string()),
            ("hl".to_string(), "en".to_string()),
            ("gl".to_string(), "us".to_string()),
        ];

        if let (Some(city), Some(state)) = (&request.city, &request.state) {
            let uule = encode_uule(&build_canonical_name(city, state));
            params.push(("uule".to_string(), uule));
        }

        client
            .get("https://www.google.com/search")
            .query(&params)
    }

    fn parse(&self, body: &str, _request: &SearchRequest) -> Result<ParsedPage> {
        let document = Html::parse_document(body);
        let mut page = ParsedPage {
            parser_version: PARSER_VERSION,
            ..ParsedPage::default()
        };

        let item_sel = Selector::parse("div[jsname] .rllt__details, div.VkpGBb").expect("valid selector");
        let name_sel = Selector::parse(".dbg0pd, .OSrXXb").expect("valid selector");
        let rating_sel = Selector::parse("span.yi40Hd, span.MW4etd").expect("valid selector");
        let reviews_sel = Selector::parse("span.RDApEe, span.UY7F9").expect("valid selector");

        for (i, item) in document.select(&item_sel).enumerate() {
            let Some(name) = item
                .select(&name_sel)
                .next()
                .map(|n| n.text().collect::<String>().trim().to_string())
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            page.businesses.push(ParsedBusiness {
                name,
                address: None,
                city: None,
                state: None,
                phone: None,
                website: None,
                lat: None,
                lng: None,
                rating: item
                    .select(&rating_sel)
                    .next()
                    .and_then(|n| parse_rating(&n.text().collect::<String>())),
                review_count: item
                    .select(&reviews_sel)
                    .next()
                    .and_then(|n| parse_review_count(&n.text().collect::<String>())),
                google_place_id: item.value().attr("data-cid").map(ToString::to_string),
                source_id: None,
                result_type: ResultType::LocalFinder,
                rank_position: i64::try_from(i).unwrap_or(i64::MAX - 1) + 1,
                snippet: None,
            });
        }

        Ok(page)
    }
}
