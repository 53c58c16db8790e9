//! Error types for the context engine

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors surfaced by fallible engine operations
///
/// Compression and cache lookups never fail; these variants cover
/// configuration, registry mutations and explicit persistence calls.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<::config::ConfigError> for ContextError {
    fn from(err: ::config::ConfigError) -> Self {
        ContextError::Configuration(err.to_string())
    }
}

impl From<prometheus::Error> for ContextError {
    fn from(err: prometheus::Error) -> Self {
        ContextError::Internal(format!("metrics: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContextError::UnknownStrategy("faq-v2".to_string());
        assert_eq!(err.to_string(), "Unknown strategy: faq-v2");

        let err = ContextError::Configuration("bad threshold".to_string());
        assert!(err.to_string().contains("bad threshold"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
        let err: ContextError = json_err.into();
        assert!(matches!(err, ContextError::Serialization(_)));
    }
}
