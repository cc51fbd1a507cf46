use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the viralscan application
#[derive(Error, Debug)]
pub enum ViralscanError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A search that reached the engine and failed
    #[error(transparent)]
    Search(#[from] crate::search::SearchError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for viralscan operations
pub type Result<T> = std::result::Result<T, ViralscanError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn startup() -> Result<()> {
        Err::<(), _>(std::io::Error::other("no threads")).context("Failed to create async runtime")?;
        Ok(())
    }

    #[test]
    fn test_context_errors_convert() {
        let err = startup().unwrap_err();
        assert!(matches!(err, ViralscanError::Other(_)));
        assert_eq!(err.to_string(), "Failed to create async runtime");
    }

    #[test]
    fn test_search_errors_are_transparent() {
        let err: ViralscanError = crate::search::SearchError::Validation("bad".into()).into();
        assert_eq!(
            err.to_string(),
            crate::search::SearchError::Validation("bad".into()).to_string()
        );
    }
}
