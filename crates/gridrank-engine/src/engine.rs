//! The common engine base: throttle discipline, stealth headers and
//! response classification shared by every concrete engine.
//!
//! Concrete engines supply a [`SearchBackend`] (URL construction plus a
//! paired parser); [`Engine`] wraps it with the pre-request and
//! post-response discipline. The scan pipeline consumes engines through
//! the [`SearchProvider`] trait so tests can substitute stubs.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::result::{ParsedPage, SearchMetadata, SearchResult};
use crate::state::{EngineState, EngineStatus};
use crate::stealth::{human_delay, CookieJar, ProfilePool, ProxyRotator};
use async_trait::async_trait;
use chrono::Utc;
use gridrank_core::{EngineId, GeoPoint};
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, SET_COOKIE, USER_AGENT};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-request HTTP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Ceiling on the error-backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Body fragments that indicate a CAPTCHA interstitial.
const CAPTCHA_INDICATORS: &[&str] = &[
    "unusual traffic",
    "captcha",
    "our systems have detected",
    "sorry/index",
    "recaptcha",
];

/// One search to execute at one grid coordinate.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query text
    pub query: String,
    /// Grid coordinate the search simulates
    pub point: GeoPoint,
    /// City for location encoding, when known
    pub city: Option<String>,
    /// State for location encoding, when known
    pub state: Option<String>,
}

/// The interface the scan pipeline consumes.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Engine identifier.
    fn engine_id(&self) -> &EngineId;

    /// Reputation group, when the engine shares provider-side reputation.
    fn reputation_group(&self) -> Option<&str>;

    /// Derived lifecycle status.
    fn status(&self) -> EngineStatus;

    /// True iff the engine can take a request right now.
    fn can_make_request(&self) -> bool;

    /// Requests made in the current UTC day.
    fn requests_today(&self) -> u32;

    /// Manually clear block state, error streak and CAPTCHA history.
    fn clear_block(&self);

    /// Execute one search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult>;
}

/// What a concrete engine supplies: request construction and parsing.
pub trait SearchBackend: Send + Sync {
    /// Domain the backend talks to, used for cookie scoping.
    fn request_domain(&self) -> &'static str;

    /// Referer header the engine sends, when any.
    fn referer(&self) -> Option<&'static str> {
        None
    }

    /// Build the HTTP request for one search.
    fn build_request(
        &self,
        client: &reqwest::Client,
        request: &SearchRequest,
    ) -> reqwest::RequestBuilder;

    /// Parse a successful response body.
    fn parse(&self, body: &str, request: &SearchRequest) -> Result<ParsedPage>;
}

/// True when a response body carries a CAPTCHA indicator.
#[must_use]
pub fn body_has_captcha_indicators(body: &str) -> bool {
    let lower = body.to_lowercase();
    CAPTCHA_INDICATORS.iter().any(|i| lower.contains(i))
}

/// A concrete engine: immutable config, owned state, a backend, and the
/// shared stealth machinery.
pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    profiles: Mutex<ProfilePool>,
    cookies: Mutex<CookieJar>,
    proxies: Option<Arc<ProxyRotator>>,
    client: reqwest::Client,
    backend: Box<dyn SearchBackend>,
}

impl Engine {
    /// Assemble an engine from its config and backend.
    ///
    /// # Errors
    /// Returns `EngineError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn SearchBackend>,
        proxies: Option<Arc<ProxyRotator>>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            state: EngineState::new(Utc::now()),
            config,
            profiles: Mutex::new(ProfilePool::new()),
            cookies: Mutex::new(CookieJar::new()),
            proxies,
            client,
            backend,
        })
    }

    /// The engine's immutable configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The engine's mutable state.
    #[must_use]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Sleep the pre-request delay: uniform base plus triangular jitter,
    /// doubled per consecutive error (clamped at five minutes), then
    /// scaled by a random factor to defeat periodicity detection.
    async fn wait_for_throttle(&self) {
        let t = &self.config.throttle;
        let mut delay = human_delay(t.min_delay_ms, t.max_delay_ms, t.jitter_ms);

        let streak = self.state.error_streak();
        if t.backoff_on_error && streak > 0 {
            let factor = 2u32.saturating_pow(streak.min(16));
            delay = delay.saturating_mul(factor).min(MAX_BACKOFF);
        }

        let factor = rand::thread_rng().gen_range(0.7..=1.3);
        tokio::time::sleep(delay.mul_f64(factor)).await;
    }

    fn apply_headers(
        &self,
        mut builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        if self.config.is_legitimate_api {
            return builder;
        }

        let profile = self
            .profiles
            .lock()
            .expect("acquire profile pool lock")
            .current();

        builder = builder
            .header(USER_AGENT, profile.user_agent)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");

        if let Some(v) = profile.sec_ch_ua {
            builder = builder.header("Sec-CH-UA", v);
        }
        if let Some(v) = profile.sec_ch_ua_platform {
            builder = builder.header("Sec-CH-UA-Platform", v);
        }
        if let Some(v) = profile.sec_ch_ua_mobile {
            builder = builder.header("Sec-CH-UA-Mobile", v);
        }

        if let Some(referer) = self.backend.referer() {
            builder = builder
                .header(REFERER, referer)
                .header("Sec-Fetch-Site", "same-origin");
        } else {
            builder = builder.header("Sec-Fetch-Site", "none");
        }

        let cookie = self
            .cookies
            .lock()
            .expect("acquire cookie jar lock")
            .header_for(self.backend.request_domain(), Utc::now());
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }

        builder
    }

    /// Enter the block path for a CAPTCHA (or Google 429) event and return
    /// the empty result the caller hands back instead of an error.
    fn block_and_empty(
        &self,
        request: &SearchRequest,
        response_time_ms: u64,
        proxy_used: bool,
        reason: &str,
    ) -> SearchResult {
        let until = self.state.record_captcha(&self.config, Utc::now());
        self.profiles
            .lock()
            .expect("acquire profile pool lock")
            .rotate();

        tracing::warn!(
            engine_id = %self.config.engine_id,
            reason = %reason,
            blocked_until = %until,
            "engine blocked"
        );

        let mut result = SearchResult::empty(
            self.config.engine_id.clone(),
            &request.query,
            request.point,
            true,
            response_time_ms,
        );
        result.metadata.proxy_used = proxy_used;
        result
    }
}

#[async_trait]
impl SearchProvider for Engine {
    fn engine_id(&self) -> &EngineId {
        &self.config.engine_id
    }

    fn reputation_group(&self) -> Option<&str> {
        self.config.reputation_group.as_deref()
    }

    fn status(&self) -> EngineStatus {
        self.state.status(&self.config, Utc::now())
    }

    fn can_make_request(&self) -> bool {
        self.state.can_make_request(&self.config, Utc::now())
    }

    fn requests_today(&self) -> u32 {
        self.state.requests_today(Utc::now())
    }

    fn clear_block(&self) {
        self.state.clear_block();
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let engine_id = self.config.engine_id.clone();

        if !self.can_make_request() {
            return Err(EngineError::Unavailable {
                engine_id,
                status: self.status().to_string(),
            });
        }

        self.wait_for_throttle().await;

        let proxy_url = self.proxies.as_ref().and_then(|p| p.acquire());
        let (client, proxy_used) = match proxy_url.as_deref() {
            Some(url) => {
                let proxy = reqwest::Proxy::all(url)?;
                let client = reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .proxy(proxy)
                    .build()?;
                (client, true)
            }
            None => (self.client.clone(), false),
        };

        let started = Instant::now();
        let builder = self.apply_headers(self.backend.build_request(&client, request));

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                self.state.record_error(Utc::now());
                if let (Some(url), Some(rotator)) = (proxy_url.as_deref(), &self.proxies) {
                    rotator.report_failure(url);
                }
                return Err(e.into());
            }
        };

        let http_status = response.status();
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(ToString::to_string))
            .collect();

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if http_status.as_u16() == 429 && self.reputation_group() == Some(crate::registry::GOOGLE_GROUP)
        {
            return Ok(self.block_and_empty(request, elapsed_ms, proxy_used, "HTTP 429"));
        }

        if !http_status.is_success() {
            self.state.record_error(Utc::now());
            return Err(EngineError::HttpStatus {
                engine_id,
                status: http_status.as_u16(),
            });
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                self.state.record_error(Utc::now());
                return Err(e.into());
            }
        };

        {
            let mut jar = self.cookies.lock().expect("acquire cookie jar lock");
            let now = Utc::now();
            for set_cookie in &set_cookies {
                jar.store(self.backend.request_domain(), set_cookie, now);
            }
        }

        if !self.config.is_legitimate_api && body_has_captcha_indicators(&body) {
            return Ok(self.block_and_empty(request, elapsed_ms, proxy_used, "captcha indicator"));
        }

        let page: ParsedPage = match self.backend.parse(&body, request) {
            Ok(p) => p,
            Err(e) => {
                self.state.record_error(Utc::now());
                return Err(e);
            }
        };

        let now = Utc::now();
        self.state.record_success(now);
        self.profiles
            .lock()
            .expect("acquire profile pool lock")
            .record_success();

        tracing::debug!(
            engine_id = %self.config.engine_id,
            businesses = page.businesses.len(),
            organic = page.organic_results.len(),
            elapsed_ms,
            "search completed"
        );

        Ok(SearchResult {
            engine_id: self.config.engine_id.clone(),
            query: request.query.clone(),
            location: request.point,
            timestamp: now,
            businesses: page.businesses,
            organic_results: page.organic_results,
            metadata: SearchMetadata {
                captcha_detected: false,
                response_time_ms: elapsed_ms,
                parser_version: page.parser_version.to_string(),
                proxy_used,
            },
        })
    }
}
