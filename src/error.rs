//! Error types for Device Duel
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Device Duel operations
///
/// The client side only ever surfaces two kinds of failure to the user:
/// [`DuelError::Transport`] and [`DuelError::Validation`]. The remaining
/// variants cover configuration, input guards, the backend's provider
/// calls, and conversions from library errors.
#[derive(Error, Debug)]
pub enum DuelError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before any network call was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network or HTTP failure (unreachable host, non-2xx, body read failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A well-formed response that does not match the expected document shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// A streamed chat fragment could not be decoded as UTF-8 text
    #[error("Decode error: {0}")]
    Decode(String),

    /// LLM provider failures (API calls, empty candidates, auth)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DuelError {
    /// Returns true for failures the client reports as transport errors
    ///
    /// Raw `reqwest` errors count as transport failures as well.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_))
    }

    /// Returns true for response-shape failures
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for Device Duel operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Callers that
/// need to classify a failure use `err.downcast_ref::<DuelError>()`.
pub type Result<T> = anyhow::Result<T>;
