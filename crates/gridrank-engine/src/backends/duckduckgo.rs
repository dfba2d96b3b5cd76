//! DuckDuckGo HTML endpoint backend: organic results only.

use crate::engine::{SearchBackend, SearchRequest};
use crate::error::Result;
use crate::result::{OrganicResult, ParsedPage};
use scraper::{Html, Selector};

const PARSER_VERSION: &str = "ddg-html/1";

/// Backend for `html.duckduckgo.com`.
#[derive(Debug, Default)]
pub struct DuckDuckGoBackend;

impl DuckDuckGoBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SearchBackend for DuckDuckGoBackend {
    fn request_domain(&self) -> &'static str {
        "html.duckduckgo.com"
    }

    // DuckDuckGo gets no referer

    fn build_request(
        &self,
        client: &reqwest::Client,
        request: &SearchRequest,
    ) -> reqwest::RequestBuilder {
        let query = match (&request.city, &request.state) {
            (Some(city), Some(state)) => format!("{} {city} {state}", request.query),
            _ => request.query.clone(),
        };

        client
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query.as_str())])
    }

    fn parse(&self, body: &str, _request: &SearchRequest) -> Result<ParsedPage> {
        let document = Html::parse_document(body);
        let mut page = ParsedPage {
            parser_version: PARSER_VERSION,
            ..ParsedPage::default()
        };

        let result_sel = Selector::parse("div.result").expect("valid selector");
        let title_sel = Selector::parse("a.result__a").expect("valid selector");
        let snippet_sel = Selector::parse("a.result__snippet").expect("valid selector");

        let mut position = 0i64;
        for item in document.select(&result_sel) {
            let Some(anchor) = item.select(&title_sel).next() else {
                continue;
            };
            let title = anchor.text().collect::<String>().trim().to_string();
            let Some(url) = anchor.value().attr("href") else {
                continue;
            };
            if title.is_empty() {
                continue;
            }

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
