//! Google SERP backend: local pack plus organic results.

use crate::backends::{parse_rating, parse_review_count};
use crate::engine::{SearchBackend, SearchRequest};
use crate::error::Result;
use crate::result::{OrganicResult, ParsedBusiness, ParsedPage};
use crate::stealth::{build_canonical_name, encode_uule};
use gridrank_core::ResultType;
use scraper::{Html, Selector};

const PARSER_VERSION: &str = "google-serp/1";

/// Backend for the main Google results page.
#[derive(Debug, Default)]
pub struct GoogleSearchBackend;

impl GoogleSearchBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SearchBackend for GoogleSearchBackend {
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
            ("num".to_string(), "20".to_string()),
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

        // Local pack cards
        let pack_item = Selector::parse("div.VkpGBb").expect("valid selector");
        let name_sel = Selector::parse(".dbg0pd").expect("valid selector");
        let rating_sel = Selector::parse("span.yi40Hd").expect("valid selector");
        let reviews_sel = Selector::parse("span.RDApEe").expect("valid selector");
        let detail_sel = Selector::parse(".rllt__details div").expect("valid selector");
        let link_sel = Selector::parse("a[href]").expect("valid selector");

        for (i, item) in document.select(&pack_item).enumerate() {
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

            let rating = item
                .select(&rating_sel)
                .next()
                .and_then(|n| parse_rating(&n.text().collect::<String>()));
            let review_count = item
                .select(&reviews_sel)
                .next()
                .and_then(|n| parse_review_count(&n.text().collect::<String>()));

            // Detail lines carry address and phone in page order
            let details: Vec<String> = item
                .select(&detail_sel)
                .map(|d| d.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            let address = details
                .iter()
                .find(|t| t.chars().next().is_some_and(char::is_numeric))
                .cloned();
            let phone = details.iter().find(|t| looks_like_phone(t)).cloned();

            let website = item
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.starts_with("http") && !href.contains("google."))
                .map(ToString::to_string);

            page.businesses.push(ParsedBusiness {
                name,
                address,
                city: None,
                state: None,
                phone,
                website,
                lat: None,
                lng: None,
                rating,
                review_count,
                google_place_id: item.value().attr("data-cid").map(ToString::to_string),
                source_id: None,
                result_type: ResultType::LocalPack,
                rank_position: i64::try_from(i).unwrap_or(i64::MAX - 1) + 1,
                snippet: None,
            });
        }

        // Organic results
        let organic_sel = Selector::parse("div.g").expect("valid selector");
        let title_sel = Selector::parse("h3").expect("valid selector");
        let snippet_sel = Selector::parse(".VwiC3b").expect("valid selector");

        let mut position = 0i64;
        for item in document.select(&organic_sel) {
            let Some(title) = item
                .select(&title_sel)
                .next()
                .map(|n| n.text().collect::<String>().trim().to_string())
            else {
                continue;
            };
            let Some(url) = item
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.starts_with("http"))
            else {
                continue;
            };

            position += 1;
            page.organic_results.push(OrganicResult {
                title,
                url: url.to_string(),
                snippet: item
                    .select(&snippet_sel)
                    .next()
                    .map(|n| n.text().collect::<String>().trim().to_string()),
                rank_position: position,
            });
        }

        Ok(page)
    }
}

fn looks_like_phone(text: &str) -> bool {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    digits >= 10 && digits <= 11 && text.chars().all(|c| {
        c.is_ascii_digit() || matches!(c, '(' | ')' | '-' | ' ' | '+' | '.')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridrank_core::GeoPoint;

    fn request() -> SearchRequest {
        SearchRequest {
            query: "pizza".to_string(),
            point: GeoPoint::new(26.4615, -80.0728),
            city: Some("Boca Raton".to_string()),
            state: Some("FL".to_string()),
        }
    }

    #[test]
    fn test_parse_local_pack() {
        let html = r#"
            <html><body>
            <div class="VkpGBb" data-cid="123456">
                <div class="dbg0pd">Joe's Pizza</div>
                <span class="yi40Hd">4.7</span>
                <span class="RDApEe">(120)</span>
                <div class="rllt__details">
                    <div>123 Main St</div>
                    <div>(561) 555-1234</div>
                </div>
                <a href="https://joespizza.example.com">Website</a>
            </div>
            <div class="g">
                <a href="https://joespizza.example.com/menu"><h3>Joe's Pizza Menu</h3></a>
                <div class="VwiC3b">Fresh pizza daily</div>
            </div>
            </body></html>
        "#;

        let backend = GoogleSearchBackend::new();
        let page = backend.parse(html, &request()).expect("parse");

        assert_eq!(page.businesses.len(), 1);
        let biz = &page.businesses[0];
        assert_eq!(biz.name, "Joe's Pizza");
        assert_eq!(biz.rating, Some(4.7));
        assert_eq!(biz.review_count, Some(120));
        assert_eq!(biz.phone.as_deref(), Some("(561) 555-1234"));
        assert_eq!(biz.address.as_deref(), Some("123 Main St"));
        assert_eq!(biz.rank_position, 1);
        assert_eq!(biz.result_type, ResultType::LocalPack);
        assert_eq!(biz.google_place_id.as_deref(), Some("123456"));

        assert_eq!(page.organic_results.len(), 1);
        assert_eq!(page.organic_results[0].title, "Joe's Pizza Menu");
    }

    #[test]
    fn test_parse_empty_page() {
        let backend = GoogleSearchBackend::new();
        let page = backend
            .parse("<html><body>No results</body></html>", &request())
            .expect("parse");
        assert!(page.businesses.is_empty());
        assert!(page.organic_results.is_empty());
    }

    #[test]
    fn test_looks_like_phone() {
        assert!(looks_like_phone("(561) 555-1234"));
        assert!(looks_like_phone("561-555-1234"));
        assert!(!looks_like_phone("123 Main St"));
        assert!(!looks_like_phone("Open 24 hours"));
    }
}
