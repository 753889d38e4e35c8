//! Errors for user synchronization.

use std::time::Duration;

use stratus_core::CorrelationId;
use stratus_db::DbError;
use stratus_directory::DirectoryError;
use thiserror::Error;

/// Result type for user sync operations.
pub type UsersyncResult<T> = Result<T, UsersyncError>;

/// Why a sync run failed.
#[derive(Debug, Error)]
pub enum UsersyncError {
    #[error("Invalid correlation id: {0}")]
    InvalidCorrelationId(CorrelationId),

    #[error("List users from directory: {0}")]
    ListRemoteUsers(#[source] DirectoryError),

    #[error("List members of admin group {group_key:?}: {source}")]
    ListAdminGroup {
        group_key: String,
        #[source]
        source: DirectoryError,
    },

    #[error("Begin transaction: {0}")]
    BeginSession(#[source] DbError),

    #[error("Load existing users and roles: {0}")]
    LoadLocalState(#[source] DbError),

    #[error("Create user {email:?}: {source}")]
    CreateUser {
        email: String,
        #[source]
        source: DbError,
    },

    #[error("Update user {email:?}: {source}")]
    UpdateUser {
        email: String,
        #[source]
        source: DbError,
    },

    #[error("Delete user {email:?}: {source}")]
    DeleteUser {
        email: String,
        #[source]
        source: DbError,
    },

    #[error("Assign role {role:?} to user {email:?}: {source}")]
    AssignRole {
        email: String,
        role: String,
        #[source]
        source: DbError,
    },

    #[error("Revoke role {role:?} from user {email:?}: {source}")]
    RevokeRole {
        email: String,
        role: String,
        #[source]
        source: DbError,
    },

    #[error("Commit transaction: {0}")]
    Commit(#[source] DbError),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Sync scheduler is not running")]
    SchedulerStopped,
}

impl UsersyncError {
    /// Check if the scheduler's next attempt could succeed unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            UsersyncError::ListRemoteUsers(e) | UsersyncError::ListAdminGroup { source: e, .. } => {
                e.is_retryable()
            }
            UsersyncError::BeginSession(e)
            | UsersyncError::LoadLocalState(e)
            | UsersyncError::Commit(e)
            | UsersyncError::CreateUser { source: e, .. }
            | UsersyncError::UpdateUser { source: e, .. }
            | UsersyncError::DeleteUser { source: e, .. }
            | UsersyncError::AssignRole { source: e, .. }
            | UsersyncError::RevokeRole { source: e, .. } => e.is_retryable(),
            UsersyncError::TimedOut(_) => true,
            UsersyncError::InvalidCorrelationId(_)
            | UsersyncError::Cancelled
            | UsersyncError::SchedulerStopped => false,
        }
    }
}
