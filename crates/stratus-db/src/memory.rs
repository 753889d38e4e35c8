//! In-memory store for testing.
//!
//! `begin` copies the committed state into the session; `commit` replaces
//! the committed state with the session's copy. Dropped or rolled back
//! sessions leave the store untouched. Individual operations can be made
//! to fail to exercise error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use stratus_core::UserId;

use crate::error::{DbError, DbResult};
use crate::models::{
    LocalUser, NewUser, ReconcilerConfigSpec, ReconcilerConfigValue, ReconcilerSpec,
    RoleAssignment, RoleName,
};
use crate::session::{Session, StateStore};

/// Store operations, used to inject failures and to inspect what a
/// committed session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Begin,
    ListUsers,
    ListUserRoles,
    CreateUser,
    UpdateUser,
    DeleteUser,
    AssignRole,
    RevokeRole,
    UpsertReconciler,
    ListConfigKeys,
    UpsertConfig,
    DeleteConfig,
    SetConfigValue,
    Commit,
}

impl StoreOp {
    /// Whether the operation changes state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            StoreOp::Begin
                | StoreOp::ListUsers
                | StoreOp::ListUserRoles
                | StoreOp::ListConfigKeys
                | StoreOp::Commit
        )
    }
}

/// A stored reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryReconciler {
    pub spec: ReconcilerSpec,
    pub enabled: bool,
}

/// A stored configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfigRow {
    pub spec: ReconcilerConfigSpec,
    pub value: Option<String>,
}

/// Snapshot of everything the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub users: Vec<LocalUser>,
    pub roles: Vec<RoleAssignment>,
    pub reconcilers: BTreeMap<String, MemoryReconciler>,
    pub reconciler_config: BTreeMap<String, BTreeMap<String, MemoryConfigRow>>,
}

impl MemoryState {
    /// Global roles held by `user_id`.
    #[must_use]
    pub fn global_roles_of(&self, user_id: UserId) -> Vec<RoleName> {
        self.roles
            .iter()
            .filter(|r| r.user_id == user_id && r.scope.is_global())
            .map(|r| r.role_name.clone())
            .collect()
    }

    #[must_use]
    pub fn user_by_email(&self, email: &str) -> Option<&LocalUser> {
        self.users.iter().find(|u| u.has_email(email))
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: MemoryState,
    failures: HashSet<StoreOp>,
    committed_ops: Vec<StoreOp>,
    commits: usize,
}

/// Transactional in-memory [`StateStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(op: StoreOp) -> DbError {
    tracing::debug!(?op, "Injected store failure");
    DbError::QueryFailed(sqlx::Error::PoolTimedOut)
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user directly into committed state.
    pub fn seed_user(&self, name: &str, email: &str, external_id: Option<&str>) -> LocalUser {
        let user = LocalUser {
            id: UserId::new(),
            external_id: external_id.map(str::to_string),
            email: email.to_lowercase(),
            name: name.to_string(),
        };
        lock(&self.inner).state.users.push(user.clone());
        user
    }

    /// Assign a global role directly in committed state.
    pub fn seed_global_role(&self, user_id: UserId, role: RoleName) {
        let mut inner = lock(&self.inner);
        let assignment = RoleAssignment::global(user_id, role);
        if !inner.state.roles.contains(&assignment) {
            inner.state.roles.push(assignment);
        }
    }

    /// Make every future call of `op` fail.
    pub fn fail_on(&self, op: StoreOp) {
        lock(&self.inner).failures.insert(op);
    }

    pub fn clear_failures(&self) {
        lock(&self.inner).failures.clear();
    }

    /// Copy of the committed state.
    #[must_use]
    pub fn snapshot(&self) -> MemoryState {
        lock(&self.inner).state.clone()
    }

    /// Every operation performed by committed sessions, in order.
    #[must_use]
    pub fn committed_ops(&self) -> Vec<StoreOp> {
        lock(&self.inner).committed_ops.clone()
    }

    /// Committed mutations only.
    #[must_use]
    pub fn committed_mutations(&self) -> Vec<StoreOp> {
        self.committed_ops()
            .into_iter()
            .filter(StoreOp::is_mutation)
            .collect()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        lock(&self.inner).commits
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn begin(&self) -> DbResult<Box<dyn Session>> {
        let inner = lock(&self.inner);
        if inner.failures.contains(&StoreOp::Begin) {
            return Err(injected(StoreOp::Begin));
        }
        Ok(Box::new(InMemorySession {
            store: Arc::clone(&self.inner),
            working: Some(inner.state.clone()),
            ops: Vec::new(),
        }))
    }
}

/// Session over a private copy of the store's state.
#[derive(Debug)]
pub struct InMemorySession {
    store: Arc<Mutex<Inner>>,
    working: Option<MemoryState>,
    ops: Vec<StoreOp>,
}

impl InMemorySession {
    fn enter(&mut self, op: StoreOp) -> DbResult<&mut MemoryState> {
        if lock(&self.store).failures.contains(&op) {
            return Err(injected(op));
        }
        let state = self.working.as_mut().ok_or(DbError::SessionClosed)?;
        self.ops.push(op);
        Ok(state)
    }
}

fn check_unique(
    state: &MemoryState,
    id: Option<UserId>,
    email: &str,
    external_id: Option<&str>,
) -> DbResult<()> {
    for other in state.users.iter().filter(|u| Some(u.id) != id) {
        if other.has_email(email) {
            return Err(DbError::DataIntegrity(format!("duplicate email {email:?}")));
        }
        if let Some(external_id) = external_id {
            if other.external_id.as_deref() == Some(external_id) {
                return Err(DbError::DataIntegrity(format!(
                    "duplicate external id {external_id:?}"
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Session for InMemorySession {
    async fn list_users(&mut self) -> DbResult<Vec<LocalUser>> {
        let state = self.enter(StoreOp::ListUsers)?;
        let mut users = state.users.clone();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn list_user_roles(&mut self) -> DbResult<Vec<RoleAssignment>> {
        let state = self.enter(StoreOp::ListUserRoles)?;
        Ok(state.roles.clone())
    }

    async fn create_user(&mut self, user: &NewUser) -> DbResult<LocalUser> {
        let state = self.enter(StoreOp::CreateUser)?;
        check_unique(state, None, &user.email, Some(&user.external_id))?;
        let created = LocalUser {
            id: UserId::new(),
            external_id: Some(user.external_id.clone()),
            email: user.email.to_lowercase(),
            name: user.name.clone(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&mut self, user: &LocalUser) -> DbResult<()> {
        let state = self.enter(StoreOp::UpdateUser)?;
        check_unique(state, Some(user.id), &user.email, user.external_id.as_deref())?;
        let existing = state
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| DbError::NotFound(format!("user {}", user.id)))?;
        existing.name.clone_from(&user.name);
        existing.email = user.email.to_lowercase();
        existing.external_id.clone_from(&user.external_id);
        Ok(())
    }

    async fn delete_user(&mut self, id: UserId) -> DbResult<()> {
        let state = self.enter(StoreOp::DeleteUser)?;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(DbError::NotFound(format!("user {id}")));
        }
        state.roles.retain(|r| r.user_id != id);
        Ok(())
    }

    async fn assign_global_role(&mut self, user_id: UserId, role: &RoleName) -> DbResult<()> {
        let state = self.enter(StoreOp::AssignRole)?;
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(DbError::DataIntegrity(format!(
                "role {role} assigned to unknown user {user_id}"
            )));
        }
        let assignment = RoleAssignment::global(user_id, role.clone());
        if !state.roles.contains(&assignment) {
            state.roles.push(assignment);
        }
        Ok(())
    }

    async fn revoke_global_role(&mut self, user_id: UserId, role: &RoleName) -> DbResult<()> {
        let state = self.enter(StoreOp::RevokeRole)?;
        state
            .roles
            .retain(|r| !(r.user_id == user_id && r.is_global_role(role)));
        Ok(())
    }

    async fn upsert_reconciler(&mut self, spec: &ReconcilerSpec) -> DbResult<()> {
        let state = self.enter(StoreOp::UpsertReconciler)?;
        state
            .reconcilers
            .entry(spec.name.clone())
            .and_modify(|r| r.spec = spec.clone())
            .or_insert_with(|| MemoryReconciler {
                spec: spec.clone(),
                enabled: spec.enabled_if_new,
            });
        Ok(())
    }

    async fn list_reconciler_config_keys(&mut self, reconciler: &str) -> DbResult<Vec<String>> {
        let state = self.enter(StoreOp::ListConfigKeys)?;
        Ok(state
            .reconciler_config
            .get(reconciler)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_reconciler_config(
        &mut self,
        reconciler: &str,
        spec: &ReconcilerConfigSpec,
    ) -> DbResult<()> {
        let state = self.enter(StoreOp::UpsertConfig)?;
        if !state.reconcilers.contains_key(reconciler) {
            return Err(DbError::DataIntegrity(format!(
                "config for unknown reconciler {reconciler:?}"
            )));
        }
        state
            .reconciler_config
            .entry(reconciler.to_string())
            .or_default()
            .entry(spec.key.clone())
            .and_modify(|row| row.spec = spec.clone())
            .or_insert_with(|| MemoryConfigRow {
                spec: spec.clone(),
                value: None,
            });
        Ok(())
    }

    async fn delete_reconciler_config(
        &mut self,
        reconciler: &str,
        keys: &[String],
    ) -> DbResult<()> {
        let state = self.enter(StoreOp::DeleteConfig)?;
        if let Some(rows) = state.reconciler_config.get_mut(reconciler) {
            for key in keys {
                rows.remove(key);
            }
        }
        Ok(())
    }

    async fn set_reconciler_config_value(
        &mut self,
        reconciler: &str,
        value: &ReconcilerConfigValue,
    ) -> DbResult<()> {
        let state = self.enter(StoreOp::SetConfigValue)?;
        let row = state
            .reconciler_config
            .get_mut(reconciler)
            .and_then(|rows| rows.get_mut(&value.key))
            .ok_or_else(|| {
                DbError::NotFound(format!(
                    "config key {:?} for reconciler {reconciler:?}",
                    value.key
                ))
            })?;
        row.value = Some(value.value.clone());
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.enter(StoreOp::Commit)?;
        let working = self.working.take().ok_or(DbError::SessionClosed)?;
        let mut inner = lock(&self.store);
        inner.state = working;
        inner.committed_ops.append(&mut self.ops);
        inner.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.working.take().ok_or(DbError::SessionClosed)?;
        self.ops.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(n: u32) -> NewUser {
        NewUser {
            external_id: n.to_string(),
            email: format!("User{n}@Example.com"),
            name: format!("User {n}"),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = InMemoryStateStore::new();
        {
            let mut session = store.begin().await.unwrap();
            session.create_user(&new_user(1)).await.unwrap();
        }
        assert!(store.snapshot().users.is_empty());
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = InMemoryStateStore::new();
        let mut session = store.begin().await.unwrap();
        let user = session.create_user(&new_user(1)).await.unwrap();
        session.commit().await.unwrap();

        let state = store.snapshot();
        assert_eq!(state.users, vec![user.clone()]);
        assert_eq!(state.users[0].email, "user1@example.com");
        assert_eq!(store.committed_mutations(), vec![StoreOp::CreateUser]);
    }

    #[tokio::test]
    async fn test_session_closed_after_commit() {
        let store = InMemoryStateStore::new();
        let mut session = store.begin().await.unwrap();
        session.commit().await.unwrap();

        assert!(matches!(
            session.list_users().await,
            Err(DbError::SessionClosed)
        ));
        assert!(matches!(session.commit().await, Err(DbError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_assign_is_idempotent() {
        let store = InMemoryStateStore::new();
        let user = store.seed_user("A", "a@example.com", Some("1"));
        let mut session = store.begin().await.unwrap();
        session
            .assign_global_role(user.id, &RoleName::TEAM_VIEWER)
            .await
            .unwrap();
        session
            .assign_global_role(user.id, &RoleName::TEAM_VIEWER)
            .await
            .unwrap();
        session.commit().await.unwrap();

        assert_eq!(store.snapshot().global_roles_of(user.id), vec![RoleName::TEAM_VIEWER]);
    }

    #[tokio::test]
    async fn test_delete_cascades_roles() {
        let store = InMemoryStateStore::new();
        let user = store.seed_user("A", "a@example.com", Some("1"));
        store.seed_global_role(user.id, RoleName::ADMIN);

        let mut session = store.begin().await.unwrap();
        session.delete_user(user.id).await.unwrap();
        session.commit().await.unwrap();

        assert!(store.snapshot().roles.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryStateStore::new();
        store.fail_on(StoreOp::CreateUser);

        let mut session = store.begin().await.unwrap();
        let err = session.create_user(&new_user(1)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_duplicate_email_violates_integrity() {
        let store = InMemoryStateStore::new();
        store.seed_user("A", "user1@example.com", None);

        let mut session = store.begin().await.unwrap();
        let err = session.create_user(&new_user(1)).await.unwrap_err();
        assert!(matches!(err, DbError::DataIntegrity(_)));
    }
}
