//! Engine error types.

use gridrank_core::EngineId;
use thiserror::Error;

/// Errors raised by engines and their support machinery.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is blocked, throttled or disabled and cannot take requests
    #[error("engine {engine_id} unavailable: {status}")]
    Unavailable {
        /// The engine that refused the request
        engine_id: EngineId,
        /// Its derived status at refusal time
        status: String,
    },

    /// The engine requires an API key and none was configured
    #[error("engine {engine_id} requires an API key")]
    MissingApiKey {
        /// The engine missing its key
        engine_id: EngineId,
    },

    /// Transport-level failure (network, timeout, DNS)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an unexpected HTTP status
    #[error("unexpected HTTP status {status} from {engine_id}")]
    HttpStatus {
        /// The engine that received the status
        engine_id: EngineId,
        /// The status code
        status: u16,
    },

    /// Response body could not be interpreted
    #[error("parse failed for {engine_id}: {reason}")]
    Parse {
        /// The engine whose parser failed
        engine_id: EngineId,
        /// What went wrong
        reason: String,
    },

    /// Invalid engine configuration
    #[error("engine configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
