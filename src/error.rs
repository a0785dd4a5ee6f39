// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Feed XML could not be parsed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required credential is not set in the environment
    #[error("Missing credential: {0} environment variable is required")]
    MissingCredential(String),

    /// The backing store exists but cannot be trusted
    #[error("Corrupt store at {path}: {message}")]
    CorruptStore { path: String, message: String },

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },

    /// Relevance capability returned an error or an unusable reply
    #[error("Relevance error: {0}")]
    Relevance(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a corrupt-store error.
    pub fn corrupt_store(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::CorruptStore {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a relevance capability error.
    pub fn relevance(message: impl fmt::Display) -> Self {
        Self::Relevance(message.to_string())
    }
}
