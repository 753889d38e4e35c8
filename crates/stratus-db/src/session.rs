//! Unit-of-work traits.
//!
//! A [`Session`] is one open transaction. Every read and write a
//! reconciliation performs goes through the session it was handed, so the
//! transaction boundary is visible in every signature. Dropping a session
//! without calling [`Session::commit`] discards its changes.

use async_trait::async_trait;
use stratus_core::UserId;

use crate::error::DbResult;
use crate::models::{
    LocalUser, NewUser, ReconcilerConfigSpec, ReconcilerConfigValue, ReconcilerSpec,
    RoleAssignment, RoleName,
};

/// Source of sessions.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> DbResult<Box<dyn Session>>;
}

/// Operations available inside one transaction.
///
/// Calls after `commit` or `rollback` fail with
/// [`DbError::SessionClosed`](crate::DbError::SessionClosed).
#[async_trait]
pub trait Session: Send {
    async fn list_users(&mut self) -> DbResult<Vec<LocalUser>>;

    async fn list_user_roles(&mut self) -> DbResult<Vec<RoleAssignment>>;

    async fn create_user(&mut self, user: &NewUser) -> DbResult<LocalUser>;

    /// Overwrite name, e-mail and external id of an existing user.
    async fn update_user(&mut self, user: &LocalUser) -> DbResult<()>;

    /// Delete a user together with its role assignments.
    async fn delete_user(&mut self, id: UserId) -> DbResult<()>;

    /// Idempotent: assigning a role the user already holds is a no-op.
    async fn assign_global_role(&mut self, user_id: UserId, role: &RoleName) -> DbResult<()>;

    async fn revoke_global_role(&mut self, user_id: UserId, role: &RoleName) -> DbResult<()>;

    async fn upsert_reconciler(&mut self, spec: &ReconcilerSpec) -> DbResult<()>;

    async fn list_reconciler_config_keys(&mut self, reconciler: &str) -> DbResult<Vec<String>>;

    async fn upsert_reconciler_config(
        &mut self,
        reconciler: &str,
        spec: &ReconcilerConfigSpec,
    ) -> DbResult<()>;

    async fn delete_reconciler_config(&mut self, reconciler: &str, keys: &[String])
        -> DbResult<()>;

    async fn set_reconciler_config_value(
        &mut self,
        reconciler: &str,
        value: &ReconcilerConfigValue,
    ) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;
}
