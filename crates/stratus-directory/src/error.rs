//! Error types for the directory client.

use thiserror::Error;

/// Result type alias using `DirectoryError`.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur when reading the external directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The requested group does not exist.
    ///
    /// Kept apart from [`DirectoryError::Api`] so callers can treat a
    /// missing group as an empty one.
    #[error("Group not found: {group_key}")]
    GroupNotFound { group_key: String },

    /// The directory answered with an error status.
    #[error("Directory API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credentials were rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl DirectoryError {
    /// Check if this error reports a missing group.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::GroupNotFound { .. })
    }

    /// Check if the same request could succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Http(e) => e.is_timeout() || e.is_connect(),
            DirectoryError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
