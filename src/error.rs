//! Domain-specific error types for presta-match

use thiserror::Error;

/// Main error type for the matching engine
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("Embedding provider error: {message}")]
    Embedding { message: String },

    #[error("Geocoding error: {message}")]
    Geocoding { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<anyhow::Error> for MatchError {
    fn from(err: anyhow::Error) -> Self {
        MatchError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MatchError {
    fn from(err: serde_json::Error) -> Self {
        MatchError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for MatchError {
    fn from(err: csv::Error) -> Self {
        MatchError::Catalog {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for MatchError {
    fn from(err: reqwest::Error) -> Self {
        MatchError::Embedding {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

impl From<chrono::ParseError> for MatchError {
    fn from(err: chrono::ParseError) -> Self {
        MatchError::Validation {
            message: format!("Date parsing error: {}", err),
        }
    }
}

/// Result type alias for matching operations
pub type Result<T> = std::result::Result<T, MatchError>;
