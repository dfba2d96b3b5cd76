//! GridRank Engine - search engine abstraction with stealth discipline.
//!
//! This crate provides the engine contract the scan pipeline consumes:
//! a [`SearchProvider`] trait returning a uniform [`SearchResult`], the
//! [`Engine`] base driver implementing throttle discipline, CAPTCHA
//! detection and the graduated block policy, a registry with shared
//! reputation-group accounting, and the stealth helpers (browser profile
//! rotation, cookie jar, proxy rotation, UULE location encoding).
//!
//! # Request lifecycle
//!
//! Every request through [`Engine::search`] goes through the same gate:
//! refresh rate buckets, sleep a humanized randomized delay (doubled per
//! error-streak step), assemble fingerprint-consistent headers, send,
//! then classify the response - CAPTCHA indicators and Google HTTP 429
//! trigger a block with an empty result rather than an error.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod result;
pub mod state;
pub mod stealth;

pub use config::{EngineConfig, ThrottleConfig};
pub use engine::{Engine, SearchBackend, SearchProvider, SearchRequest};
pub use error::{EngineError, Result};
pub use registry::{EngineRegistry, GOOGLE_GROUP};
pub use result::{OrganicResult, ParsedBusiness, ParsedPage, SearchMetadata, SearchResult};
pub use state::{EngineState, EngineStatus};
