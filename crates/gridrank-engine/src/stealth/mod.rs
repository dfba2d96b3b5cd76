//! Stealth helpers: fingerprint rotation, cookies, proxies, location
//! encoding and humanized delays.

pub mod cookies;
pub mod delay;
pub mod profiles;
pub mod proxy;
pub mod uule;

pub use cookies::CookieJar;
pub use delay::human_delay;
pub use profiles::{BrowserProfile, ProfilePool};
pub use proxy::ProxyRotator;
pub use uule::{build_canonical_name, encode_uule};
