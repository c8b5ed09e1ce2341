//! Error types for Stemix.

use thiserror::Error;

/// Result type alias using Stemix's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Stemix.
#[derive(Error, Debug)]
pub enum Error {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Network error: {0}")]
    Network(String),

    // Separation API errors
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Separation job failed: {0}")]
    JobFailed(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    // Audio errors
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Audio context could not be activated: {0}")]
    AudioContext(String),

    // Loading errors
    #[error("Failed to load stem '{stem}': {source}")]
    Stem {
        stem: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Loading stems timed out after {secs} seconds")]
    LoadTimeout { secs: u64 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP-specific errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed with status {status}: {message}")]
    StatusError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Wrap an error with the name of the stem that produced it.
    pub fn for_stem(stem: impl Into<String>, source: Self) -> Self {
        Self::Stem {
            stem: stem.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::RateLimited { .. }
                | Self::Http(HttpError::ConnectionFailed(_) | HttpError::Timeout)
        )
    }
}
