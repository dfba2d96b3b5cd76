//! Shared identifier and enumeration types.
//!
//! These newtypes carry validation so that malformed identifiers are rejected
//! at the boundary rather than deep inside the scan pipeline.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for search engine identifiers with validation.
///
/// Engine IDs are lowercase alphanumeric with underscores, 3-32 characters,
/// e.g. `google_search`, `bing_api`, `duckduckgo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(String);

impl EngineId {
    /// Create a new `EngineId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this engine reports to the Bing review columns.
    #[must_use]
    pub fn is_bing(&self) -> bool {
        self.0.starts_with("bing")
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        static ENGINE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = ENGINE_REGEX
            .get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{1,30}[a-z0-9]$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid engine ID: must be lowercase alphanumeric with underscores, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a parsed listing appeared on the results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Map-anchored three-pack on the main SERP
    LocalPack,
    /// Standard organic result
    Organic,
    /// Google Maps listing
    Maps,
    /// Expanded local finder list (20+ results)
    LocalFinder,
    /// Knowledge panel entity
    KnowledgePanel,
    /// "People also ask" block
    PeopleAlsoAsk,
    /// Related searches block
    RelatedSearches,
    /// Paid placement
    Ads,
}

impl ResultType {
    /// Stable string form used in persistence.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalPack => "local_pack",
            Self::Organic => "organic",
            Self::Maps => "maps",
            Self::LocalFinder => "local_finder",
            Self::KnowledgePanel => "knowledge_panel",
            Self::PeopleAlsoAsk => "people_also_ask",
            Self::RelatedSearches => "related_searches",
            Self::Ads => "ads",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "local_pack" => Ok(Self::LocalPack),
            "organic" => Ok(Self::Organic),
            "maps" => Ok(Self::Maps),
            "local_finder" => Ok(Self::LocalFinder),
            "knowledge_panel" => Ok(Self::KnowledgePanel),
            "people_also_ask" => Ok(Self::PeopleAlsoAsk),
            "related_searches" => Ok(Self::RelatedSearches),
            "ads" => Ok(Self::Ads),
            other => Err(CoreError::Validation(format!(
                "unknown result type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source attribution for a review snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    /// Ratings scraped or fetched from a Google surface
    Google,
    /// Ratings from the Bing API or Bing surfaces
    Bing,
}

impl ReviewSource {
    /// Snapshot source for an engine: `bing` for Bing engines, `google` otherwise.
    #[must_use]
    pub fn for_engine(engine_id: &EngineId) -> Self {
        if engine_id.is_bing() {
            Self::Bing
        } else {
            Self::Google
        }
    }

    /// Stable string form used in persistence.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Bing => "bing",
        }
    }
}

impl fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_id_valid() {
        let valid = vec![
            "google_search",
            "google_local_finder",
            "bing_api",
            "duckduckgo",
        ];
        for id in valid {
            assert!(EngineId::new(id).is_ok(), "Failed for: {id}");
        }
    }

    #[test]
    fn test_engine_id_invalid() {
        let invalid = vec![
            "GS",             // Too short
            "Google",         // Uppercase
            "google-search",  // Hyphen
            "google search",  // Space
            "_google",        // Starts with underscore
            "google_",        // Ends with underscore
        ];
        for id in invalid {
            assert!(EngineId::new(id).is_err(), "Should fail for: {id}");
        }
    }

    #[test]
    fn test_engine_id_is_bing() {
        assert!(EngineId::new("bing_api").expect("valid id").is_bing());
        assert!(EngineId::new("bing_local").expect("valid id").is_bing());
        assert!(!EngineId::new("google_search").expect("valid id").is_bing());
    }

    #[test]
    fn test_result_type_round_trip() {
        let all = [
            ResultType::LocalPack,
            ResultType::Organic,
            ResultType::Maps,
            ResultType::LocalFinder,
            ResultType::KnowledgePanel,
            ResultType::PeopleAlsoAsk,
            ResultType::RelatedSearches,
            ResultType::Ads,
        ];
        for rt in all {
            assert_eq!(ResultType::parse(rt.as_str()).expect("parse"), rt);
        }
        assert!(ResultType::parse("banner").is_err());
    }

    #[test]
    fn test_review_source_for_engine() {
        let bing = EngineId::new("bing_api").expect("valid id");
        let google = EngineId::new("google_maps").expect("valid id");
        assert_eq!(ReviewSource::for_engine(&bing), ReviewSource::Bing);
        assert_eq!(ReviewSource::for_engine(&google), ReviewSource::Google);
    }

    #[test]
    fn test_result_type_serialization() {
        let json = serde_json::to_string(&ResultType::LocalPack).expect("serialize");
        assert_eq!(json, "\"local_pack\"");
    }
}
