// src/error.rs

//! Unified error handling for the catalog tracker.

use std::fmt;

use thiserror::Error;

/// Result type alias for tracker operations.
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

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Property list could not be read at all
    #[error("Property list error: {0}")]
    Plist(#[from] plist::Error),

    /// Catalog structure does not match the recognized schema
    #[error("Schema violation in {context}: {message}")]
    Schema { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Listing published identifiers failed
    #[error("Known-set resolution failed for {repo}: {message}")]
    KnownSet { repo: String, message: String },

    /// A git command exited unsuccessfully
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    /// One or more records could not be published
    #[error("Failed to publish {} record(s): {}", failed.len(), failed.join(", "))]
    Publish { failed: Vec<String> },
}

impl AppError {
    /// Create a schema violation error.
    pub fn schema(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Schema {
            context: context.into(),
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

    /// Create a known-set resolution error.
    pub fn known_set(repo: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::KnownSet {
            repo: repo.into(),
            message: message.to_string(),
        }
    }

    /// Create a git command error.
    pub fn git(command: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Git {
            command: command.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error is a schema violation.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}
