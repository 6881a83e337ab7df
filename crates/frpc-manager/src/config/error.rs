//! Config store error types.

use thiserror::Error;

/// Result type for config store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while loading or saving the configuration document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored file is valid JSON but not a configuration document.
    #[error("config document has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),

    /// The document was rejected by validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Invalid("duplicate proxy name 'web'".to_string());
        assert_eq!(err.to_string(), "invalid config: duplicate proxy name 'web'");
    }
}
