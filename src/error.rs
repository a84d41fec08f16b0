// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to retrieve a single source over HTTP.
///
/// Always recoverable: the orchestrator counts it and skips the source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request exceeded the configured timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a non-2xx status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Connection, TLS, redirect or body decoding failure
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// Classify a reqwest error for the given URL.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = error.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Source could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fetched page produced no substantive chunks
    #[error("No substantive content extracted from {url}")]
    SegmentationEmpty { url: String },

    /// The generative backend failed at the transport or protocol level
    #[error("Generative backend error: {0}")]
    Backend(String),

    /// Checkpoint, marker or event write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a generative backend error.
    pub fn backend(message: impl fmt::Display) -> Self {
        Self::Backend(message.to_string())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::Status {
            url: "https://ex.com/notes".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "https://ex.com/notes returned HTTP 404");

        let app: AppError = err.into();
        assert!(matches!(app, AppError::Fetch(FetchError::Status { status: 404, .. })));
    }
}
