//! Concrete engine backends, one per source.
//!
//! Parsers here are deliberately thin: selectors for scraped sources rot
//! and the pipeline only depends on the [`crate::SearchResult`] shape, so
//! a backend that extracts nothing still produces a well-formed empty
//! page.

pub mod bing_api;
pub mod duckduckgo;
pub mod google_local_finder;
pub mod google_maps;
pub mod google_search;

pub use bing_api::BingApiBackend;
pub use duckduckgo::DuckDuckGoBackend;
pub use google_local_finder::GoogleLocalFinderBackend;
pub use google_maps::GoogleMapsBackend;
pub use google_search::GoogleSearchBackend;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::registry::EngineRegistry;
use crate::stealth::ProxyRotator;
use std::sync::Arc;

/// Build the default engine set.
///
/// Registers Google Search, Google Local Finder, DuckDuckGo, and - when an
/// API key is configured - the Bing API engine. Google Maps over direct
/// HTTP is unreliable (SPA shell) and is left for the caller to register
/// explicitly.
pub fn build_default_registry(
    bing_api_key: Option<&str>,
    proxies: Option<Arc<ProxyRotator>>,
) -> Result<EngineRegistry> {
    let registry = EngineRegistry::new();

    registry.register(Arc::new(Engine::new(
        EngineConfig::google_search(),
        Box::new(GoogleSearchBackend::new()),
        proxies.clone(),
    )?));
    registry.register(Arc::new(Engine::new(
        EngineConfig::google_local_finder(),
        Box::new(GoogleLocalFinderBackend::new()),
        proxies.clone(),
    )?));
    registry.register(Arc::new(Engine::new(
        EngineConfig::duckduckgo(),
        Box::new(DuckDuckGoBackend::new()),
        proxies.clone(),
    )?));

    if let Some(key) = bing_api_key {
        registry.register(Arc::new(Engine::new(
            EngineConfig::bing_api(),
            Box::new(BingApiBackend::new(key)),
            proxies,
        )?));
    }

    Ok(registry)
}

/// Parse a rating like `4.7` out of display text.
pub(crate) fn parse_rating(text: &str) -> Option<f64> {
    let rating: f64 = text.trim().split_whitespace().next()?.parse().ok()?;
    (rating > 0.0 && rating <= 5.0).then_some((rating * 100.0).round() / 100.0)
}

/// Parse a review count like `(1,204)` out of display text.
pub(crate) fn parse_review_count(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
