//! Core error types shared across GridRank crates.

use thiserror::Error;

/// Errors raised by core validation and configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed a domain validation rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration could not be assembled from the environment.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::Validation("bad grid size".to_string());
        assert_eq!(err.to_string(), "validation error: bad grid size");
    }
}
