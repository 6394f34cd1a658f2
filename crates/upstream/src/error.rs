//! Error types for the upstream adapters.

use fleetsync_core::errors::UpstreamSystem;
use thiserror::Error;

/// Result type alias for adapter calls.
pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Retry policy class for upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the upstream
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request could not be built (bad header value, empty key, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or malformed credentials
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl UpstreamError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Classify error for retry policy. Only timeouts, rate limits and
    /// server-side failures are worth another attempt.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) => ApiRetryClass::Permanent,
            Self::InvalidRequest(_) => ApiRetryClass::Permanent,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
        }
    }

    /// Converts into the core error, tagged with the system that failed.
    pub fn into_core(self, system: UpstreamSystem) -> fleetsync_core::Error {
        let status = self.status_code();
        fleetsync_core::Error::upstream(system, status, self.to_string())
    }
}
