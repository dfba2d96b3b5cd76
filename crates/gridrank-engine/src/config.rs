//! Immutable per-engine configuration.

use gridrank_core::EngineId;

/// Rate-limiting parameters for one engine.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Lower bound of the inter-request delay
    pub min_delay_ms: u64,
    /// Upper bound of the inter-request delay
    pub max_delay_ms: u64,
    /// Hourly request budget
    pub max_per_hour: u32,
    /// Daily request budget (resets at UTC midnight)
    pub max_per_day: u32,
    /// Triangular jitter added to each delay
    pub jitter_ms: u64,
    /// Whether the delay doubles per consecutive error
    pub backoff_on_error: bool,
    /// Ceiling (and no-history default) for CAPTCHA pauses, in hours
    pub pause_on_captcha_hours: u32,
}

/// Immutable configuration of one engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine identifier
    pub engine_id: EngineId,
    /// Engines sharing a provider-side reputation, e.g. `google`
    pub reputation_group: Option<String>,
    /// Rate limits
    pub throttle: ThrottleConfig,
    /// True for sanctioned APIs that skip stealth headers
    pub is_legitimate_api: bool,
    /// True when the engine cannot run without an API key
    pub requires_api_key: bool,
}

impl EngineConfig {
    /// Google SERP scraping configuration.
    ///
    /// # Panics
    /// Never; the engine id literal is valid.
    #[must_use]
    pub fn google_search() -> Self {
        Self {
            engine_id: EngineId::new("google_search").expect("valid engine id"),
            reputation_group: Some("google".to_string()),
            throttle: ThrottleConfig {
                min_delay_ms: 8_000,
                max_delay_ms: 20_000,
                max_per_hour: 30,
                max_per_day: 120,
                jitter_ms: 2_500,
                backoff_on_error: true,
                pause_on_captcha_hours: 24,
            },
            is_legitimate_api: false,
            requires_api_key: false,
        }
    }

    /// Google local-finder (`tbm=lcl`) configuration.
    #[must_use]
    pub fn google_local_finder() -> Self {
        Self {
            engine_id: EngineId::new("google_local_finder").expect("valid engine id"),
            ..Self::google_search()
        }
    }

    /// Google Maps direct-HTTP configuration.
    #[must_use]
    pub fn google_maps() -> Self {
        Self {
            engine_id: EngineId::new("google_maps").expect("valid engine id"),
            ..Self::google_search()
        }
    }

    /// DuckDuckGo HTML endpoint configuration.
    #[must_use]
    pub fn duckduckgo() -> Self {
        Self {
            engine_id: EngineId::new("duckduckgo").expect("valid engine id"),
            reputation_group: None,
            throttle: ThrottleConfig {
                min_delay_ms: 3_000,
                max_delay_ms: 9_000,
                max_per_hour: 60,
                max_per_day: 400,
                jitter_ms: 1_500,
                backoff_on_error: true,
                pause_on_captcha_hours: 6,
            },
            is_legitimate_api: false,
            requires_api_key: false,
        }
    }

    /// Bing Web Search API configuration.
    #[must_use]
    pub fn bing_api() -> Self {
        Self {
            engine_id: EngineId::new("bing_api").expect("valid engine id"),
            reputation_group: None,
            throttle: ThrottleConfig {
                min_delay_ms: 150,
                max_delay_ms: 600,
                max_per_hour: 900,
                max_per_day: 9_000,
                jitter_ms: 100,
                backoff_on_error: true,
                pause_on_captcha_hours: 1,
            },
            is_legitimate_api: true,
            requires_api_key: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_engines_share_group() {
        assert_eq!(
            EngineConfig::google_search().reputation_group.as_deref(),
            Some("google")
        );
        assert_eq!(
            EngineConfig::google_maps().reputation_group.as_deref(),
            Some("google")
        );
        assert_eq!(
            EngineConfig::google_local_finder()
                .reputation_group
                .as_deref(),
            Some("google")
        );
        assert_eq!(EngineConfig::duckduckgo().reputation_group, None);
    }

    #[test]
    fn test_bing_api_is_sanctioned() {
        let config = EngineConfig::bing_api();
        assert!(config.is_legitimate_api);
        assert!(config.requires_api_key);
    }
}
