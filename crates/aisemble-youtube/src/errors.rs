//! Error types for the video platform client.

use thiserror::Error;

/// Errors that can occur talking to the video platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP transport or body-decode error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform returned a non-success status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// Response parsed but a required field was absent.
    #[error("unexpected payload: {message}")]
    Payload {
        /// What was missing or malformed.
        message: String,
    },
}

/// Convenience type alias for platform results.
pub type Result<T> = std::result::Result<T, PlatformError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
