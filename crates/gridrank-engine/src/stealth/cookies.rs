//! Per-engine cookie jar.
//!
//! Stores `Set-Cookie` values keyed by domain, honors `Max-Age` and
//! `Expires`, and returns a single `Cookie` header for the next request to
//! a matching domain. Expired entries are pruned on read.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    expires_at: Option<DateTime<Utc>>,
}

/// A simple domain-suffix-matching cookie jar.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one `Set-Cookie` header value received from `domain`.
    ///
    /// `Max-Age` takes precedence over `Expires` when both are present.
    /// A cookie whose name repeats for the same domain is replaced.
    pub fn store(&mut self, domain: &str, set_cookie: &str, now: DateTime<Utc>) {
        let mut parts = set_cookie.split(';').map(str::trim);

        let Some(pair) = parts.next() else { return };
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            return;
        }

        let mut cookie_domain = domain.to_string();
        let mut expires_at = None;

        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            match key.to_ascii_lowercase().as_str() {
                "max-age" => {
                    if let Ok(seconds) = val.trim().parse::<i64>() {
                        expires_at = Some(now + Duration::seconds(seconds));
                    }
                }
                "expires" => {
                    if expires_at.is_none() {
                        if let Ok(t) = DateTime::parse_from_rfc2822(val.trim()) {
                            expires_at = Some(t.with_timezone(&Utc));
                        }
                    }
                }
                "domain" => {
                    let val = val.trim().trim_start_matches('.');
                    if !val.is_empty() {
                        cookie_domain = val.to_string();
                    }
                }
                _ => {}
            }
        }

        self.cookies
            .retain(|c| !(c.name == name && c.domain == cookie_domain));
        self.cookies.push(StoredCookie {
            name,
            value: value.trim().to_string(),
            domain: cookie_domain,
            expires_at,
        });
    }

    /// Build the `Cookie` header for a request to `domain`.
    ///
    /// Matches stored cookies whose domain is a suffix of the request
    /// domain; expired entries are dropped first. Returns `None` when
    /// nothing matches.
    pub fn header_for(&mut self, domain: &str, now: DateTime<Utc>) -> Option<String> {
        self.cookies
            .retain(|c| c.expires_at.is_none_or(|t| t > now));

        let header = self
            .cookies
            .iter()
            .filter(|c| domain_matches(domain, &c.domain))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    /// Number of live cookies (including not-yet-pruned expired entries).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// True when the jar holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn domain_matches(request_domain: &str, cookie_domain: &str) -> bool {
    request_domain == cookie_domain
        || request_domain
            .strip_suffix(cookie_domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_store_and_read_back() {
        let now = at("2026-08-01T10:00:00Z");
        let mut jar = CookieJar::new();

        jar.store("www.google.com", "NID=abc123; Path=/; HttpOnly", now);
        jar.store("www.google.com", "AEC=x9z; Secure", now);

        let header = jar.header_for("www.google.com", now).expect("cookie header");
        assert!(header.contains("NID=abc123"));
        assert!(header.contains("AEC=x9z"));
        assert!(header.contains("; "));
    }

    #[test]
    fn test_max_age_expiry_pruned_on_read() {
        let now = at("2026-08-01T10:00:00Z");
        let mut jar = CookieJar::new();

        jar.store("example.com", "short=1; Max-Age=60", now);
        assert!(jar.header_for("example.com", now).is_some());

        let later = now + Duration::seconds(61);
        assert!(jar.header_for("example.com", later).is_none());
        assert!(jar.is_empty());
    }

    #[test]
    fn test_expires_attribute() {
        let now = at("2026-08-01T10:00:00Z");
        let mut jar = CookieJar::new();

        jar.store(
            "example.com",
            "session=xyz; Expires=Sat, 01 Aug 2026 11:00:00 GMT",
            now,
        );
        assert!(jar.header_for("example.com", now).is_some());
        assert!(jar
            .header_for("example.com", at("2026-08-01T11:00:01Z"))
            .is_none());
    }

    #[test]
    fn test_domain_suffix_matching() {
        let now = at("2026-08-01T10:00:00Z");
        let mut jar = CookieJar::new();

        jar.store("www.google.com", "NID=1; Domain=.google.com", now);

        assert!(jar.header_for("www.google.com", now).is_some());
        assert!(jar.header_for("maps.google.com", now).is_some());
        assert!(jar.header_for("google.com", now).is_some());
        // Suffix containment must respect label boundaries
        assert!(jar.header_for("notgoogle.com", now).is_none());
        assert!(jar.header_for("www.bing.com", now).is_none());
    }

    #[test]
    fn test_same_name_replaces() {
        let now = at("2026-08-01T10:00:00Z");
        let mut jar = CookieJar::new();

        jar.store("example.com", "v=1", now);
        jar.store("example.com", "v=2", now);

        assert_eq!(jar.len(), 1);
        assert_eq!(
            jar.header_for("example.com", now).as_deref(),
            Some("v=2")
        );
    }
}
