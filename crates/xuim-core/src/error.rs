//! Error types for the xuim engine
//!
//! This module defines all error types used throughout the crate.
//!
//! Row-level decode problems (malformed `settings` JSON, a `clients` field
//! that is not an array) are deliberately absent: they are absorbed by the
//! directory reader and never surface as errors.

use thiserror::Error;

/// Result type alias for xuim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the xuim engine
#[derive(Error, Debug)]
pub enum Error {
    /// The backing store could not be opened
    #[error("Cannot open database: {0}")]
    Connection(String),

    /// Statement-level store errors
    #[error("Store error: {0}")]
    Store(String),

    /// A mutation failed mid-flight and its transaction was rolled back
    #[error("{operation} failed for {target}: {message}")]
    Operation {
        /// Operation name (e.g. "record_traffic")
        operation: String,
        /// Affected identifier (email, inbound id, ...)
        target: String,
        /// Underlying cause
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied input rejected before touching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap a failure with the operation name and the affected identifier
    pub fn operation(
        operation: impl Into<String>,
        target: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::Operation {
            operation: operation.into(),
            target: target.into(),
            message: cause.to_string(),
        }
    }

    /// Whether the caller should abort the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Config(_))
    }

    /// Whether the error was raised by input validation
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
