//! UULE location encoding for Google URLs.
//!
//! Google's `uule` parameter carries an opaque encoding of a canonical
//! location name so a request appears to originate from that place:
//! `w+CAIQICI` followed by a length character and the base64 of the name.

use base64::Engine as _;

/// Length-character alphabet; the N-th character encodes a canonical name
/// of N bytes.
const LENGTH_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Canonical location name in the form Google expects.
#[must_use]
pub fn build_canonical_name(city: &str, state: &str) -> String {
    format!("{city},{state},United States")
}

/// Encode a canonical name into a `uule` parameter value.
#[must_use]
pub fn encode_uule(canonical_name: &str) -> String {
    let len_char = LENGTH_ALPHABET
        .get(canonical_name.len())
        .copied()
        .unwrap_or(b'A') as char;
    let encoded = base64::engine::general_purpose::STANDARD.encode(canonical_name);
    format!("w+CAIQICI{len_char}{encoded}")
}
