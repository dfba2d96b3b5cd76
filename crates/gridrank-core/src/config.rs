//! Environment-based application configuration.
//!
//! GridRank is configured entirely through environment variables; every value
//! has a default and absence never panics. The enclosing application reads
//! this once at startup and hands the relevant pieces to each subsystem.

use std::fmt;

/// Application configuration assembled from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Database connection string (`DATABASE_URL`)
    pub database_url: String,
    /// Bing Web Search API key (`BING_SEARCH_API_KEY`), optional
    pub bing_search_api_key: Option<String>,
    /// Google Places API key (`GOOGLE_PLACES_API_KEY`), optional
    pub google_places_api_key: Option<String>,
    /// Default grid size for full scans (`DEFAULT_GRID_SIZE`, default 7)
    pub default_grid_size: u32,
    /// Comma-separated proxy URLs (`PROXY_LIST`), optional
    pub proxy_list: Option<String>,
    /// Path to a proxy list file, one per line (`PROXY_FILE`), optional
    pub proxy_file: Option<String>,
    /// Log filter directive (`LOG_LEVEL`, default `info`)
    pub log_level: String,
    /// Allowed CORS origin for the enclosing HTTP layer (`CORS_ORIGIN`)
    pub cors_origin: String,
}

impl AppConfig {
    /// Assemble configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://gridrank.db".to_string()),
            bing_search_api_key: non_empty_var("BING_SEARCH_API_KEY"),
            google_places_api_key: non_empty_var("GOOGLE_PLACES_API_KEY"),
            default_grid_size: std::env::var("DEFAULT_GRID_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            proxy_list: non_empty_var("PROXY_LIST"),
            proxy_file: non_empty_var("PROXY_FILE"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            cors_origin: std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        };

        tracing::debug!(
            grid_size = config.default_grid_size,
            bing_api = config.bing_search_api_key.is_some(),
            proxies = config.proxy_list.is_some() || config.proxy_file.is_some(),
            "configuration loaded from environment"
        );

        config
    }
}

impl fmt::Debug for AppConfig {
    // API keys stay out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("bing_search_api_key", &self.bing_search_api_key.as_ref().map(|_| "***"))
            .field("google_places_api_key", &self.google_places_api_key.as_ref().map(|_| "***"))
            .field("default_grid_size", &self.default_grid_size)
            .field("proxy_list", &self.proxy_list)
            .field("proxy_file", &self.proxy_file)
            .field("log_level", &self.log_level)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Env vars are process-global; only assert on keys the test suite
        // never sets.
        let config = AppConfig::from_env();
        assert!(config.default_grid_size >= 3);
        assert!(!config.log_level.is_empty());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = AppConfig {
            database_url: "sqlite://:memory:".to_string(),
            bing_search_api_key: Some("secret-key".to_string()),
            google_places_api_key: None,
            default_grid_size: 7,
            proxy_list: None,
            proxy_file: None,
            log_level: "info".to_string(),
            cors_origin: "*".to_string(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("***"));
    }
}
