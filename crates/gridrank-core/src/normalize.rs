//! Deterministic normalization used for business entity resolution.
//!
//! All three functions are pure and idempotent; the matcher and the data
//! layer both rely on them producing identical output for identical input.

/// Legal suffixes stripped from the tail of a business name.
const LEGAL_SUFFIXES: &[&str] = &[
    "llc",
    "inc",
    "corp",
    "corporation",
    "incorporated",
    "ltd",
    "limited",
    "co",
    "company",
    "llp",
    "lp",
    "pllc",
    "pc",
    "pa",
    "plc",
];

/// Normalize a business name for matching.
///
/// Lowercases, removes non-alphanumeric characters, collapses whitespace and
/// strips trailing legal suffixes (`LLC`, `Inc`, ...). At least one token is
/// always retained so a name consisting only of suffixes does not normalize
/// to the empty string.
#[must_use]
pub fn normalize_business_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1
        && tokens
            .last()
            .is_some_and(|last| LEGAL_SUFFIXES.contains(last))
    {
        tokens.pop();
    }

    tokens.join(" ")
}

/// Normalize a phone number to `+1` + 10 digits.
///
/// Accepts 10-digit US numbers and 11-digit numbers with a leading `1`;
/// every other shape returns `None`.
#[must_use]
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        10 => Some(format!("+1{digits}")),
        11 if digits.starts_with('1') => Some(format!("+{digits}")),
        _ => None,
    }
}

/// Normalize a website URL to its bare registrable host.
///
/// Strips scheme, `www.` prefix, path, query and port; lowercases the rest.
/// Returns `None` when nothing host-like remains.
#[must_use]
pub fn normalize_domain(url: &str) -> Option<String> {
    let lower = url.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);

    let host = without_scheme
        .split(['/', '?', '#', ':'])
        .next()
        .unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() || !host.contains('.') {
        None
    } else {
        Some(host.to_string())
    }
}
