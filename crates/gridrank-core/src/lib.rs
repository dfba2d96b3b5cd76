//! GridRank Core - shared domain primitives.
//!
//! This crate provides the types every other GridRank crate builds on:
//! validated identifiers, geographic primitives, the normalization functions
//! used for business entity resolution, and environment-based configuration.
//!
//! # Design Principles
//!
//! - Identifiers are newtypes validated at construction, not raw strings
//! - Normalization is deterministic and idempotent (`normalize(normalize(s)) == normalize(s)`)
//! - Configuration comes from the environment only; absence never panics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod geo;
pub mod normalize;
pub mod types;

pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use geo::{haversine_miles, GeoPoint, EARTH_RADIUS_MILES, MILES_PER_DEGREE_LAT};
pub use normalize::{normalize_business_name, normalize_domain, normalize_phone};
pub use types::{EngineId, ResultType, ReviewSource};
