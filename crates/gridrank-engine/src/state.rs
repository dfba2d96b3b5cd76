//! Mutable engine state: rate buckets, error streak and block window.
//!
//! Each engine owns exactly one `EngineState`; only that engine's queue
//! worker mutates it, but status reads may come from any task, so the
//! inner data sits behind a mutex.
//!
//! Time is passed in explicitly everywhere so the graduated block policy
//! can be exercised in tests without waiting out real windows.

use crate::config::EngineConfig;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Derived lifecycle status of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Ready to take a request
    Healthy,
    /// Hourly or daily budget exhausted; recovers on the next bucket reset
    Throttled,
    /// CAPTCHA or rate-limit response tripped; recovers at `blocked_until`
    Blocked,
    /// Administratively disabled
    Disabled,
}

impl EngineStatus {
    /// Stable string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Throttled => "throttled",
            Self::Blocked => "blocked",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
struct StateInner {
    requests_this_hour: u32,
    hour_bucket_start: DateTime<Utc>,
    requests_today: u32,
    day_bucket_date: chrono::NaiveDate,
    last_request_at: Option<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
    error_streak: u32,
    captcha_events: VecDeque<DateTime<Utc>>,
    disabled: bool,
}

/// Mutable counters and block state for one engine.
#[derive(Debug)]
pub struct EngineState {
    inner: Mutex<StateInner>,
}

impl EngineState {
    /// Fresh state anchored at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(StateInner {
                requests_this_hour: 0,
                hour_bucket_start: truncate_to_hour(now),
                requests_today: 0,
                day_bucket_date: now.date_naive(),
                last_request_at: None,
                blocked_until: None,
                error_streak: 0,
                captcha_events: VecDeque::new(),
                disabled: false,
            }),
        }
    }

    /// Reset rate buckets that have elapsed.
    ///
    /// The hourly bucket resets at each elapsed hour; the daily bucket
    /// resets at the next UTC midnight.
    pub fn refresh_buckets(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        refresh(&mut inner, now);
    }

    /// Derive the engine status, auto-clearing an expired block.
    ///
    /// Read order: disabled, blocked, throttled, healthy.
    pub fn status(&self, config: &EngineConfig, now: DateTime<Utc>) -> EngineStatus {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        refresh(&mut inner, now);

        if inner.disabled {
            return EngineStatus::Disabled;
        }

        if let Some(until) = inner.blocked_until {
            if now < until {
                return EngineStatus::Blocked;
            }
            // Expired blocks clear silently on read
            inner.blocked_until = None;
        }

        if inner.requests_this_hour >= config.throttle.max_per_hour
            || inner.requests_today >= config.throttle.max_per_day
        {
            return EngineStatus::Throttled;
        }

        EngineStatus::Healthy
    }

    /// True iff the derived status is healthy.
    pub fn can_make_request(&self, config: &EngineConfig, now: DateTime<Utc>) -> bool {
        self.status(config, now) == EngineStatus::Healthy
    }

    /// Account a successful request: bump counters, stamp the request time,
    /// clear the error streak.
    pub fn record_success(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        refresh(&mut inner, now);
        inner.requests_this_hour += 1;
        inner.requests_today += 1;
        inner.last_request_at = Some(now);
        inner.error_streak = 0;
    }

    /// Account a failed request; returns the new streak length.
    pub fn record_error(&self, now: DateTime<Utc>) -> u32 {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        inner.last_request_at = Some(now);
        inner.error_streak += 1;
        inner.error_streak
    }

    /// Account a CAPTCHA (or Google 429) event and enter the blocked state.
    ///
    /// Block length follows the 24-hour sliding window: first event 15
    /// minutes, second 2 hours, third or more 24 hours, never exceeding the
    /// configured `pause_on_captcha_hours` ceiling. Returns the block expiry.
    pub fn record_captcha(&self, config: &EngineConfig, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut inner = self.inner.lock().expect("acquire engine state lock");

        let window_start = now - Duration::hours(24);
        while inner
            .captcha_events
            .front()
            .is_some_and(|t| *t < window_start)
        {
            inner.captcha_events.pop_front();
        }
        inner.captcha_events.push_back(now);

        let graduated = match inner.captcha_events.len() {
            1 => Duration::minutes(15),
            2 => Duration::hours(2),
            _ => Duration::hours(24),
        };
        let ceiling = Duration::hours(i64::from(config.throttle.pause_on_captcha_hours));
        let pause = graduated.min(ceiling);

        let until = now + pause;
        inner.blocked_until = Some(until);
        until
    }

    /// Manually clear the block, error streak and CAPTCHA history.
    pub fn clear_block(&self) {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        inner.blocked_until = None;
        inner.error_streak = 0;
        inner.captcha_events.clear();
    }

    /// Administratively disable or re-enable the engine.
    pub fn set_disabled(&self, disabled: bool) {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        inner.disabled = disabled;
    }

    /// Requests made in the current UTC day.
    pub fn requests_today(&self, now: DateTime<Utc>) -> u32 {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        refresh(&mut inner, now);
        inner.requests_today
    }

    /// Requests made in the current hourly bucket.
    pub fn requests_this_hour(&self, now: DateTime<Utc>) -> u32 {
        let mut inner = self.inner.lock().expect("acquire engine state lock");
        refresh(&mut inner, now);
        inner.requests_this_hour
    }

    /// Current consecutive error count.
    pub fn error_streak(&self) -> u32 {
        self.inner
            .lock()
            .expect("acquire engine state lock")
            .error_streak
    }

    /// Current block expiry, when blocked.
    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .expect("acquire engine state lock")
            .blocked_until
    }

    /// Time of the most recent request, success or failure.
    pub fn last_request_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .expect("acquire engine state lock")
            .last_request_at
    }

    /// CAPTCHA events currently inside the 24-hour window.
    pub fn captcha_events_in_window(&self, now: DateTime<Utc>) -> usize {
        let inner = self.inner.lock().expect("acquire engine state lock");
        let window_start = now - Duration::hours(24);
        inner
            .captcha_events
            .iter()
            .filter(|t| **t >= window_start)
            .count()
    }
}

fn refresh(inner: &mut StateInner, now: DateTime<Utc>) {
    let hour = truncate_to_hour(now);
    if hour > inner.hour_bucket_start {
        inner.hour_bucket_start = hour;
        inner.requests_this_hour = 0;
    }

    let today = now.date_naive();
    if today > inner.day_bucket_date {
        inner.day_bucket_date = today;
        inner.requests_today = 0;
    }
}

fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(t.year(), t.month(), t.day(), t.hour(), 0, 0)
        .single()
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_fresh_state_is_healthy() {
        let config = EngineConfig::google_search();
        let now = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(now);
        assert_eq!(state.status(&config, now), EngineStatus::Healthy);
        assert!(state.can_make_request(&config, now));
    }

    #[test]
    fn test_hourly_throttle_and_reset() {
        let config = EngineConfig::google_search();
        let now = at("2026-08-01T10:30:00Z");
        let state = EngineState::new(now);

        for _ in 0..config.throttle.max_per_hour {
            state.record_success(now);
        }
        assert_eq!(state.status(&config, now), EngineStatus::Throttled);

        // The next hour opens a fresh bucket
        let later = at("2026-08-01T11:00:01Z");
        assert_eq!(state.status(&config, later), EngineStatus::Healthy);
        assert_eq!(state.requests_this_hour(later), 0);
    }

    #[test]
    fn test_daily_throttle_resets_at_utc_midnight() {
        let mut config = EngineConfig::google_search();
        config.throttle.max_per_hour = 10;
        config.throttle.max_per_day = 12;

        // Four requests an hour for three hours: daily budget trips while
        // every hourly bucket stays under its limit
        let mut now = at("2026-08-01T08:00:00Z");
        let state = EngineState::new(now);
        for _ in 0..3 {
            for _ in 0..4 {
                state.record_success(now);
            }
            now += Duration::hours(1);
        }
        assert_eq!(state.requests_today(now), 12);
        assert_eq!(state.status(&config, now), EngineStatus::Throttled);

        let next_day = at("2026-08-02T00:00:01Z");
        assert_eq!(state.status(&config, next_day), EngineStatus::Healthy);
        assert_eq!(state.requests_today(next_day), 0);
    }

    #[test]
    fn test_graduated_captcha_blocks() {
        let config = EngineConfig::google_search();
        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        // First event: 15 minutes
        let until = state.record_captcha(&config, t0);
        assert_eq!(until, t0 + Duration::minutes(15));
        assert_eq!(state.status(&config, t0), EngineStatus::Blocked);

        // Second event 30 minutes later: 2 hours
        let t1 = t0 + Duration::minutes(30);
        let until = state.record_captcha(&config, t1);
        assert_eq!(until, t1 + Duration::hours(2));

        // Third event within the window: 24 hours
        let t2 = t0 + Duration::hours(3);
        let until = state.record_captcha(&config, t2);
        assert_eq!(until, t2 + Duration::hours(24));
        assert_eq!(state.captcha_events_in_window(t2), 3);
    }

    #[test]
    fn test_captcha_window_slides() {
        let config = EngineConfig::google_search();
        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        state.record_captcha(&config, t0);

        // 25 hours later the old event has left the window; back to tier one
        let t1 = t0 + Duration::hours(25);
        let until = state.record_captcha(&config, t1);
        assert_eq!(until, t1 + Duration::minutes(15));
        assert_eq!(state.captcha_events_in_window(t1), 1);
    }

    #[test]
    fn test_captcha_ceiling_applies() {
        let mut config = EngineConfig::google_search();
        config.throttle.pause_on_captcha_hours = 1;

        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        state.record_captcha(&config, t0);
        let t1 = t0 + Duration::minutes(10);
        let until = state.record_captcha(&config, t1);
        // Second tier would be 2 hours; the ceiling caps it at 1
        assert_eq!(until, t1 + Duration::hours(1));
    }

    #[test]
    fn test_block_clears_on_read_after_expiry() {
        let config = EngineConfig::google_search();
        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        state.record_captcha(&config, t0);
        assert_eq!(state.status(&config, t0), EngineStatus::Blocked);

        let after = t0 + Duration::minutes(16);
        assert_eq!(state.status(&config, after), EngineStatus::Healthy);
        assert!(state.blocked_until().is_none());
    }

    #[test]
    fn test_manual_clear_resets_everything() {
        let config = EngineConfig::google_search();
        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        state.record_captcha(&config, t0);
        state.record_error(t0);
        state.clear_block();

        assert_eq!(state.status(&config, t0), EngineStatus::Healthy);
        assert_eq!(state.error_streak(), 0);
        assert_eq!(state.captcha_events_in_window(t0), 0);
    }

    #[test]
    fn test_error_streak_resets_on_success() {
        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        assert_eq!(state.record_error(t0), 1);
        assert_eq!(state.record_error(t0), 2);
        state.record_success(t0);
        assert_eq!(state.error_streak(), 0);
    }

    #[test]
    fn test_disabled_wins_over_everything() {
        let config = EngineConfig::google_search();
        let t0 = at("2026-08-01T10:00:00Z");
        let state = EngineState::new(t0);

        state.record_captcha(&config, t0);
        state.set_disabled(true);
        assert_eq!(state.status(&config, t0), EngineStatus::Disabled);

        state.set_disabled(false);
        assert_eq!(state.status(&config, t0), EngineStatus::Blocked);
    }
}
