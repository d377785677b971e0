//! Error types for the inference client.

use thiserror::Error;

/// Result type for inference client operations.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Inference service errors.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Configuration error (missing API key, invalid settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// The service asked us to slow down (HTTP 429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Non-2xx response other than rate limiting
    #[error("inference API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid JSON or unexpected response format
    #[error("parse error: {0}")]
    Parse(String),
}

impl InferenceError {
    /// Whether a retry has a realistic chance of succeeding.
    ///
    /// Network failures, rate limiting, and server-side (5xx) errors are
    /// transient; configuration, client-side (4xx), and parse errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::Network(_) | InferenceError::RateLimited(_) => true,
            InferenceError::Api { status, .. } => *status >= 500,
            InferenceError::Config(_) | InferenceError::Parse(_) => false,
        }
    }
}
