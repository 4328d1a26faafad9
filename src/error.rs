// src/error.rs

//! Unified error handling for the alert pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
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

    /// CSV parsing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive could not be read
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Protobuf envelope could not be decoded
    #[error("Feed decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Schedule or real-time feed could not be fetched or parsed
    #[error("Upstream error from {source_name}: {message}")]
    UpstreamFetch {
        source_name: String,
        message: String,
    },

    /// Fingerprint store unavailable
    #[error("Store error: {0}")]
    Store(String),

    /// Another pass holds the run lock
    #[error("A run is already in progress")]
    RunInProgress,

    /// Pass exceeded its time budget and was cancelled
    #[error("Run timed out after {0}s")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an upstream fetch error with the name of the failing source.
    pub fn upstream(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::UpstreamFetch {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error came from one of the upstream feeds.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamFetch { .. })
    }
}
