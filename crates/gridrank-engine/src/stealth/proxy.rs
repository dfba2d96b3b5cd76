//! Shared round-robin proxy rotation with failure cooldown.
//!
//! One rotator is shared by every engine; a proxy reported failed by any
//! engine sits out a 30-minute cooldown before re-entering the rotation.
//! Only HTTP/HTTPS proxies are supported.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cooldown applied to a failed proxy.
const FAILURE_COOLDOWN: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct ProxyEntry {
    url: String,
    failed_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct RotatorInner {
    entries: Vec<ProxyEntry>,
    next: usize,
}

/// Round-robin proxy allocator shared across engines.
#[derive(Debug, Default)]
pub struct ProxyRotator {
    inner: Mutex<RotatorInner>,
}

impl ProxyRotator {
    /// Build a rotator from an explicit list of proxy URLs.
    ///
    /// Entries that are not `http://` or `https://` are skipped with a
    /// warning; SOCKS is not supported.
    #[must_use]
    pub fn from_list(urls: &[String]) -> Self {
        let entries = urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .filter(|u| {
                let supported = u.starts_with("http://") || u.starts_with("https://");
                if !supported {
                    tracing::warn!(proxy = %u, "skipping unsupported proxy scheme");
                }
                supported
            })
            .map(|u| ProxyEntry {
                url: u.to_string(),
                failed_at: None,
            })
            .collect();

        Self {
            inner: Mutex::new(RotatorInner { entries, next: 0 }),
        }
    }

    /// Build a rotator from the environment: a comma-separated `PROXY_LIST`
    /// value, or a `PROXY_FILE` path with one proxy per line (`#` comments
    /// skipped). Returns `None` when neither source yields a proxy.
    #[must_use]
    pub fn from_env(proxy_list: Option<&str>, proxy_file: Option<&Path>) -> Option<Self> {
        let mut urls: Vec<String> = vec![];

        if let Some(list) = proxy_list {
            urls.extend(list.split(',').map(|s| s.trim().to_string()));
        }

        if let Some(path) = proxy_file {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    urls.extend(
                        contents
                            .lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty() && !l.starts_with('#'))
                            .map(ToString::to_string),
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read proxy file");
                }
            }
        }

        let rotator = Self::from_list(&urls);
        if rotator.len() == 0 {
            None
        } else {
            Some(rotator)
        }
    }

    /// Allocate the next proxy in rotation, skipping cooled-down entries.
    ///
    /// Returns `None` when every proxy is cooling down (or none are
    /// configured); callers then go direct.
    pub fn acquire(&self) -> Option<String> {
        let mut inner = self.inner.lock().expect("acquire proxy rotator lock");
        let count = inner.entries.len();
        if count == 0 {
            return None;
        }

        for _ in 0..count {
            let index = inner.next % count;
            inner.next = inner.next.wrapping_add(1);

            let entry = &mut inner.entries[index];
            match entry.failed_at {
                Some(failed) if failed.elapsed() < FAILURE_COOLDOWN => continue,
                _ => {
                    entry.failed_at = None;
                    return Some(entry.url.clone());
                }
            }
        }

        None
    }

    /// Report a proxy failure; the entry sits out the cooldown.
    pub fn report_failure(&self, url: &str) {
        let mut inner = self.inner.lock().expect("acquire proxy rotator lock");
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.url == url) {
            entry.failed_at = Some(Instant::now());
            tracing::warn!(proxy = %url, "proxy entered failure cooldown");
        }
    }

    /// Number of configured proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("acquire proxy rotator lock")
            .entries
            .len()
    }

    /// True when no proxies are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_order() {
        let rotator = ProxyRotator::from_list(&[
            "http://p1:8080".to_string(),
            "http://p2:8080".to_string(),
        ]);

        assert_eq!(rotator.acquire().as_deref(), Some("http://p1:8080"));
        assert_eq!(rotator.acquire().as_deref(), Some("http://p2:8080"));
        assert_eq!(rotator.acquire().as_deref(), Some("http://p1:8080"));
    }

    #[test]
    fn test_failed_proxy_skipped() {
        let rotator = ProxyRotator::from_list(&[
            "http://p1:8080".to_string(),
            "http://p2:8080".to_string(),
        ]);

        rotator.report_failure("http://p1:8080");
        assert_eq!(rotator.acquire().as_deref(), Some("http://p2:8080"));
        assert_eq!(rotator.acquire().as_deref(), Some("http://p2:8080"));
    }

    #[test]
    fn test_all_failed_yields_none() {
        let rotator = ProxyRotator::from_list(&["http://p1:8080".to_string()]);
        rotator.report_failure("http://p1:8080");
        assert_eq!(rotator.acquire(), None);
    }

    #[test]
    fn test_socks_rejected() {
        let rotator = ProxyRotator::from_list(&[
            "socks5://p1:1080".to_string(),
            "http://p2:8080".to_string(),
        ]);
        assert_eq!(rotator.len(), 1);
    }

    #[test]
    fn test_from_env_list() {
        let rotator =
            ProxyRotator::from_env(Some("http://a:1, http://b:2"), None).expect("rotator");
        assert_eq!(rotator.len(), 2);
    }

    #[test]
    fn test_from_env_empty_is_none() {
        assert!(ProxyRotator::from_env(None, None).is_none());
    }
}
