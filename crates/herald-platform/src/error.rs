//! Error types for platform clients.

use thiserror::Error;

/// Errors that can occur when talking to a hosted platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP transport failed (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The referenced record does not exist (anymore).
    #[error("record not found: {resource}/{id}")]
    NotFound { resource: String, id: String },

    /// Rate limited.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying (from Retry-After header, optional).
        retry_after_secs: Option<u64>,
    },

    /// Credentials rejected.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The platform rejected the payload as invalid.
    #[error("validation rejected: {0}")]
    Validation(String),

    /// Any other API-level failure.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl PlatformError {
    /// Whether a retry with backoff has a chance of succeeding.
    ///
    /// Network failures, rate limits and 5xx responses are transient.
    /// Validation, auth and not-found outcomes are terminal: repeating the
    /// same request cannot change them.
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::Http(_) => true,
            PlatformError::RateLimited { .. } => true,
            PlatformError::Api { status, .. } => *status >= 500,
            PlatformError::Json(_)
            | PlatformError::NotFound { .. }
            | PlatformError::Auth(_)
            | PlatformError::Validation(_) => false,
        }
    }
}
