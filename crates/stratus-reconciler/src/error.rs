//! Reconciler registry errors.

use stratus_db::DbError;
use thiserror::Error;

/// Result type for reconciler operations.
pub type ReconcilerResult<T> = Result<T, ReconcilerError>;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Invalid registration for reconciler {reconciler:?}: {message}")]
    InvalidRegistration { reconciler: String, message: String },

    #[error(
        "unknown configuration option {key:?} for reconciler {reconciler:?}. Valid options: {}",
        valid.join(", ")
    )]
    UnknownConfigKey {
        reconciler: String,
        key: String,
        /// Declared keys, sorted.
        valid: Vec<String>,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl ReconcilerError {
    /// Whether the caller sent something the registry cannot accept.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReconcilerError::InvalidRegistration { .. } | ReconcilerError::UnknownConfigKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_lists_valid_options() {
        let err = ReconcilerError::UnknownConfigKey {
            reconciler: "github:team".into(),
            key: "token".into(),
            valid: vec!["app_id".into(), "org".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown configuration option \"token\" for reconciler \"github:team\". Valid options: app_id, org"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_database_errors_are_not_client_errors() {
        let err = ReconcilerError::from(DbError::SessionClosed);
        assert!(!err.is_client_error());
    }
}
