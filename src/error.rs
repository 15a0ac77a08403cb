//! Error types for gfi-sweep
//!
//! This module provides the error handling for the library:
//! - [`Error`] for everything that can abort a sweep (configuration and persistence)
//! - [`TransportError`] for per-attempt network failures, which never abort a sweep
//! - Exit code mapping so the CLI can report failures consistently

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gfi-sweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gfi-sweep
///
/// Only configuration and persistence failures are represented here. Failures
/// of individual feature-info requests are absorbed by the fetch orchestrator
/// and surface as [`crate::types::ResponseOutcome`] values instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "service.base_url")
        key: Option<String>,
    },

    /// Bounding box could not be parsed or is degenerate
    #[error("invalid bounding box: {0}")]
    InvalidBBox(String),

    /// Raster or grid dimensions are not positive
    #[error("invalid grid configuration: {0}")]
    InvalidGridConfig(String),

    /// A feature document could not be written to the output directory
    #[error("failed to persist {path}: {source}")]
    Persist {
        /// The artifact path that could not be written
        path: PathBuf,
        /// The underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Network error while building or using the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sweep was cancelled before it could complete
    #[error("sweep cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error was raised before any network activity took place
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::InvalidBBox(_) | Error::InvalidGridConfig(_)
        )
    }
}

/// Failure of a single feature-info request
///
/// Transport errors are recoverable: they trigger the protocol fallback or are
/// absorbed on the last attempt. They never reach the process exit code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Could not connect to the service
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure (malformed URL, body read error, ...)
    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Map domain errors to process exit codes
///
/// Configuration problems use exit code 2 (usage error), everything else that
/// aborts a sweep uses exit code 1.
pub trait ToExitCode {
    /// Get the process exit code for this error
    fn exit_code(&self) -> u8;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> u8 {
        match self {
            Error::Config { .. } | Error::InvalidBBox(_) | Error::InvalidGridConfig(_) => 2,
            Error::Cancelled => 130,
            Error::Persist { .. }
            | Error::Network(_)
            | Error::Serialization(_) => 1,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidBBox(_) => "invalid_bbox",
            Error::InvalidGridConfig(_) => "invalid_grid_config",
            Error::Persist { .. } => "persist_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Cancelled => "cancelled",
        }
    }
}
