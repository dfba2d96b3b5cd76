//! Browser fingerprint profiles for anti-detection.
//!
//! Each profile keeps its user agent and client-hint headers internally
//! consistent; Firefox profiles carry no client hints because Firefox does
//! not send them. The pool rotates after every 20 successful requests and
//! on every CAPTCHA event.

use rand::Rng;

/// Successful requests between automatic rotations.
const ROTATE_AFTER_SUCCESSES: u32 = 20;

/// One internally consistent browser fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct BrowserProfile {
    /// `User-Agent` header value
    pub user_agent: &'static str,
    /// `Sec-CH-UA` header value (Chromium family only)
    pub sec_ch_ua: Option<&'static str>,
    /// `Sec-CH-UA-Platform` header value
    pub sec_ch_ua_platform: Option<&'static str>,
    /// `Sec-CH-UA-Mobile` header value
    pub sec_ch_ua_mobile: Option<&'static str>,
}

const PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        sec_ch_ua_platform: Some("\"Windows\""),
        sec_ch_ua_mobile: Some("?0"),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        sec_ch_ua_platform: Some("\"macOS\""),
        sec_ch_ua_mobile: Some("?0"),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        sec_ch_ua_platform: Some("\"Linux\""),
        sec_ch_ua_mobile: Some("?0"),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Chromium\";v=\"130\", \"Google Chrome\";v=\"130\", \"Not?A_Brand\";v=\"99\""),
        sec_ch_ua_platform: Some("\"Windows\""),
        sec_ch_ua_mobile: Some("?0"),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        sec_ch_ua: Some("\"Microsoft Edge\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        sec_ch_ua_platform: Some("\"Windows\""),
        sec_ch_ua_mobile: Some("?0"),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        sec_ch_ua: Some("\"Microsoft Edge\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        sec_ch_ua_platform: Some("\"macOS\""),
        sec_ch_ua_mobile: Some("?0"),
    },
    // Firefox sends no client hints
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        sec_ch_ua_mobile: None,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        sec_ch_ua_mobile: None,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        sec_ch_ua_mobile: None,
    },
];

/// Rotating pool of browser fingerprints.
#[derive(Debug)]
pub struct ProfilePool {
    current: usize,
    successes_since_rotation: u32,
}

impl ProfilePool {
    /// Create a pool positioned at a uniformly random profile.
    #[must_use]
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            current: rng.gen_range(0..PROFILES.len()),
            successes_since_rotation: 0,
        }
    }

    /// The active profile.
    #[must_use]
    pub fn current(&self) -> BrowserProfile {
        PROFILES[self.current]
    }

    /// Switch to a different profile than the current one.
    pub fn rotate(&mut self) {
        let mut rng = rand::thread_rng();
        let mut next = rng.gen_range(0..PROFILES.len());
        while next == self.current {
            next = rng.gen_range(0..PROFILES.len());
        }
        self.current = next;
        self.successes_since_rotation = 0;
        tracing::debug!(profile = self.current, "rotated browser profile");
    }

    /// Count a successful request, rotating every 20th.
    pub fn record_success(&mut self) {
        self.successes_since_rotation += 1;
        if self.successes_since_rotation >= ROTATE_AFTER_SUCCESSES {
            self.rotate();
        }
    }

    /// Number of profiles in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        PROFILES.len()
    }

    /// The pool is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for ProfilePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_has_at_least_nine_profiles() {
        assert!(ProfilePool::new().len() >= 9);
    }

    #[test]
    fn test_firefox_profiles_omit_client_hints() {
        for profile in PROFILES {
            if profile.user_agent.contains("Firefox") {
                assert!(profile.sec_ch_ua.is_none());
                assert!(profile.sec_ch_ua_platform.is_none());
                assert!(profile.sec_ch_ua_mobile.is_none());
            } else {
                assert!(profile.sec_ch_ua.is_some());
                assert!(profile.sec_ch_ua_platform.is_some());
                assert!(profile.sec_ch_ua_mobile.is_some());
            }
        }
    }

    #[test]
    fn test_rotate_changes_profile() {
        let mut pool = ProfilePool::new();
        for _ in 0..25 {
            let before = pool.current;
            pool.rotate();
            assert_ne!(pool.current, before);
        }
    }

    #[test]
    fn test_rotates_after_twenty_successes() {
        let mut pool = ProfilePool::new();
        let before = pool.current;
        for _ in 0..19 {
            pool.record_success();
        }
        assert_eq!(pool.current, before);
        pool.record_success();
        assert_ne!(pool.current, before);
    }
}
