//! `PostgreSQL` implementation of [`StateStore`] and [`Session`].
//!
//! Expected tables:
//!
//! - `users (id uuid pk, name, email unique, external_id unique null)`
//! - `user_roles (id, user_id fk on delete cascade, role_name, target_team_slug null)`
//!   with a unique index over `(user_id, role_name, coalesce(target_team_slug, ''))`
//! - `reconcilers (name pk, display_name, description, member_aware, enabled)`
//! - `reconciler_config (reconciler fk, key, display_name, description, secret, value null)`
//! - `audit_log (id, created_at, correlation_id, target_type, target_identifier, action, message, data jsonb)`

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use stratus_core::UserId;
use tracing::{debug, instrument, warn};

use crate::error::{DbError, DbResult};
use crate::models::{
    LocalUser, NewUser, ReconcilerConfigSpec, ReconcilerConfigValue, ReconcilerSpec,
    RoleAssignment, RoleName,
};
use crate::session::{Session, StateStore};

/// Store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn begin(&self) -> DbResult<Box<dyn Session>> {
        let tx = self.pool.begin().await.map_err(DbError::ConnectionFailed)?;
        debug!("Database transaction started");
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }
}

/// One open Postgres transaction.
///
/// Rolled back on drop unless committed.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn tx(&mut self) -> DbResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(DbError::SessionClosed)
    }
}

#[async_trait]
impl Session for PgSession {
    async fn list_users(&mut self) -> DbResult<Vec<LocalUser>> {
        let tx = self.tx()?;
        LocalUser::list_all(&mut **tx)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn list_user_roles(&mut self) -> DbResult<Vec<RoleAssignment>> {
        let tx = self.tx()?;
        RoleAssignment::list_all(&mut **tx)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn create_user(&mut self, user: &NewUser) -> DbResult<LocalUser> {
        let tx = self.tx()?;
        LocalUser::create(&mut **tx, user)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn update_user(&mut self, user: &LocalUser) -> DbResult<()> {
        let tx = self.tx()?;
        let updated = LocalUser::update(&mut **tx, user)
            .await
            .map_err(DbError::QueryFailed)?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn delete_user(&mut self, id: UserId) -> DbResult<()> {
        let tx = self.tx()?;
        let deleted = LocalUser::delete(&mut **tx, id)
            .await
            .map_err(DbError::QueryFailed)?;
        if deleted == 0 {
            return Err(DbError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn assign_global_role(&mut self, user_id: UserId, role: &RoleName) -> DbResult<()> {
        let tx = self.tx()?;
        RoleAssignment::assign_global(&mut **tx, user_id, role)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn revoke_global_role(&mut self, user_id: UserId, role: &RoleName) -> DbResult<()> {
        let tx = self.tx()?;
        RoleAssignment::revoke_global(&mut **tx, user_id, role)
            .await
            .map_err(DbError::QueryFailed)?;
        Ok(())
    }

    async fn upsert_reconciler(&mut self, spec: &ReconcilerSpec) -> DbResult<()> {
        let tx = self.tx()?;
        ReconcilerSpec::upsert(&mut **tx, spec)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn list_reconciler_config_keys(&mut self, reconciler: &str) -> DbResult<Vec<String>> {
        let tx = self.tx()?;
        ReconcilerConfigSpec::list_keys(&mut **tx, reconciler)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn upsert_reconciler_config(
        &mut self,
        reconciler: &str,
        spec: &ReconcilerConfigSpec,
    ) -> DbResult<()> {
        let tx = self.tx()?;
        ReconcilerConfigSpec::upsert(&mut **tx, reconciler, spec)
            .await
            .map_err(DbError::QueryFailed)
    }

    async fn delete_reconciler_config(
        &mut self,
        reconciler: &str,
        keys: &[String],
    ) -> DbResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let tx = self.tx()?;
        ReconcilerConfigSpec::delete_keys(&mut **tx, reconciler, keys)
            .await
            .map_err(DbError::QueryFailed)?;
        Ok(())
    }

    async fn set_reconciler_config_value(
        &mut self,
        reconciler: &str,
        value: &ReconcilerConfigValue,
    ) -> DbResult<()> {
        let tx = self.tx()?;
        let updated = value
            .set(&mut **tx, reconciler)
            .await
            .map_err(DbError::QueryFailed)?;
        if updated == 0 {
            return Err(DbError::NotFound(format!(
                "config key {:?} for reconciler {reconciler:?}",
                value.key
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn commit(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::SessionClosed)?;
        tx.commit().await.map_err(DbError::QueryFailed)?;
        debug!("Database transaction committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn rollback(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::SessionClosed)?;
        tx.rollback().await.map_err(DbError::QueryFailed)?;
        warn!("Database transaction rolled back");
        Ok(())
    }
}
