// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A single fetch failed (network, timeout or HTTP status)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV output failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Page body could not be interpreted as text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A spawned worker ended abnormally
    #[error("Task error: {0}")]
    Task(String),
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

    /// Create a parse error.
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }
}

/// Why a fetch failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("{0}")]
    Network(String),
}

/// Failure of one fetch, carrying the requested URL and the cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: impl fmt::Display, cause: FetchCause) -> Self {
        Self {
            url: url.to_string(),
            cause,
        }
    }

    pub fn timeout(url: impl fmt::Display) -> Self {
        Self::new(url, FetchCause::Timeout)
    }

    pub fn status(url: impl fmt::Display, status: u16) -> Self {
        Self::new(url, FetchCause::Status(status))
    }

    pub fn network(url: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::new(url, FetchCause::Network(message.to_string()))
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(url: impl fmt::Display, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(url)
        } else if let Some(status) = err.status() {
            Self::status(url, status.as_u16())
        } else {
            Self::network(url, err)
        }
    }
}
