//! Error types for the stratus-db crate.
//!
//! Wraps `SQLx` errors with the context a reconciliation run needs to decide
//! whether to give up or let the scheduler try again.

use stratus_audit::AuditError;
use thiserror::Error;

/// Database operation errors.
///
/// # Example
///
/// ```rust
/// use stratus_db::DbError;
///
/// fn describe(err: &DbError) -> &'static str {
///     match err {
///         DbError::ConnectionFailed(_) => "cannot connect",
///         DbError::QueryFailed(_) => "query error",
///         DbError::SessionClosed => "session already finished",
///         DbError::NotFound(_) => "missing",
///         DbError::DataIntegrity(_) => "corrupt data",
///         DbError::MigrationFailed(_) => "schema out of date",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// The session was used after commit or rollback.
    #[error("Session already committed or rolled back")]
    SessionClosed,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data violates an invariant the code relies on.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// Applying a schema migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    /// Check if a later attempt could succeed without any change to the data.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::ConnectionFailed(_) => true,
            DbError::QueryFailed(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<AuditError> for DbError {
    fn from(err: AuditError) -> Self {
        DbError::DataIntegrity(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_session_closed() {
        assert_eq!(
            DbError::SessionClosed.to_string(),
            "Session already committed or rolled back"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(DbError::QueryFailed(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(DbError::ConnectionFailed(sqlx::Error::PoolClosed).is_retryable());
        assert!(!DbError::QueryFailed(sqlx::Error::RowNotFound).is_retryable());
        assert!(!DbError::SessionClosed.is_retryable());
        assert!(!DbError::NotFound("user".into()).is_retryable());
    }

    #[test]
    fn test_decode_errors_become_integrity_violations() {
        let err: DbError = AuditError::UnknownEvent {
            target_type: "team".into(),
            action: "created".into(),
        }
        .into();
        assert!(matches!(err, DbError::DataIntegrity(_)));
    }
}
