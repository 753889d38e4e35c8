//! Reconciler registration and configuration rows.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// Metadata an external reconciler declares when it registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerSpec {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Whether the reconciler acts on team membership.
    pub member_aware: bool,
    /// Initial enabled state. Ignored when the reconciler already exists.
    pub enabled_if_new: bool,
}

/// One configuration key a reconciler declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReconcilerConfigSpec {
    pub key: String,
    pub display_name: String,
    pub description: String,
    /// Values of secret keys are never returned to API consumers.
    pub secret: bool,
}

/// A value to store for a declared configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfigValue {
    pub key: String,
    pub value: String,
}

impl ReconcilerSpec {
    /// Insert or refresh reconciler metadata. `enabled` is only set on insert.
    pub async fn upsert<'e, E>(executor: E, spec: &ReconcilerSpec) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO reconcilers (name, display_name, description, member_aware, enabled)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                description = EXCLUDED.description,
                member_aware = EXCLUDED.member_aware
            ",
        )
        .bind(&spec.name)
        .bind(&spec.display_name)
        .bind(&spec.description)
        .bind(spec.member_aware)
        .bind(spec.enabled_if_new)
        .execute(executor)
        .await?;

        Ok(())
    }
}

impl ReconcilerConfigSpec {
    /// Keys currently persisted for a reconciler.
    pub async fn list_keys<'e, E>(executor: E, reconciler: &str) -> Result<Vec<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r"
            SELECT key FROM reconciler_config
            WHERE reconciler = $1
            ORDER BY key
            ",
        )
        .bind(reconciler)
        .fetch_all(executor)
        .await
    }

    /// Insert a key or refresh its metadata. Existing values are kept.
    pub async fn upsert<'e, E>(
        executor: E,
        reconciler: &str,
        spec: &ReconcilerConfigSpec,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO reconciler_config (reconciler, key, display_name, description, secret)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (reconciler, key) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                description = EXCLUDED.description,
                secret = EXCLUDED.secret
            ",
        )
        .bind(reconciler)
        .bind(&spec.key)
        .bind(&spec.display_name)
        .bind(&spec.description)
        .bind(spec.secret)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Delete the given keys. Returns the number of rows removed.
    pub async fn delete_keys<'e, E>(
        executor: E,
        reconciler: &str,
        keys: &[String],
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            DELETE FROM reconciler_config
            WHERE reconciler = $1 AND key = ANY($2)
            ",
        )
        .bind(reconciler)
        .bind(keys)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

impl ReconcilerConfigValue {
    /// Store this value for an existing key. Returns the number of rows changed.
    pub async fn set<'e, E>(&self, executor: E, reconciler: &str) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE reconciler_config
            SET value = $3
            WHERE reconciler = $1 AND key = $2
            ",
        )
        .bind(reconciler)
        .bind(&self.key)
        .bind(&self.value)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
