//! Role assignment model.
//!
//! An assignment ties a user to a named role, either globally or within one
//! team. `(user_id, role_name, scope)` is unique.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use stratus_core::UserId;
use uuid::Uuid;

/// Name of a platform role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub const ADMIN: RoleName = RoleName(Cow::Borrowed("Admin"));
    pub const TEAM_CREATOR: RoleName = RoleName(Cow::Borrowed("Team creator"));
    pub const TEAM_VIEWER: RoleName = RoleName(Cow::Borrowed("Team viewer"));
    pub const USER_VIEWER: RoleName = RoleName(Cow::Borrowed("User viewer"));
    pub const SERVICE_ACCOUNT_CREATOR: RoleName = RoleName(Cow::Borrowed("Service account creator"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Roles granted to every synchronized user, in assignment order.
pub const DEFAULT_ROLE_NAMES: [RoleName; 4] = [
    RoleName::TEAM_CREATOR,
    RoleName::TEAM_VIEWER,
    RoleName::USER_VIEWER,
    RoleName::SERVICE_ACCOUNT_CREATOR,
];

/// Where a role applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "team")]
pub enum RoleScope {
    Global,
    /// Scoped to the team with this slug.
    Team(String),
}

impl RoleScope {
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, RoleScope::Global)
    }
}

/// A role held by a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: UserId,
    pub role_name: RoleName,
    pub scope: RoleScope,
}

impl RoleAssignment {
    #[must_use]
    pub fn global(user_id: UserId, role_name: RoleName) -> Self {
        Self {
            user_id,
            role_name,
            scope: RoleScope::Global,
        }
    }

    /// Whether this is the global assignment of `role`.
    #[must_use]
    pub fn is_global_role(&self, role: &RoleName) -> bool {
        self.scope.is_global() && &self.role_name == role
    }

    /// List every assignment.
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<RoleRow> = sqlx::query_as(
            r"
            SELECT user_id, role_name, target_team_slug
            FROM user_roles
            ORDER BY user_id, role_name
            ",
        )
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(Self::from).collect())
    }

    /// Assign a global role. Existing assignments are left untouched.
    pub async fn assign_global<'e, E>(
        executor: E,
        user_id: UserId,
        role: &RoleName,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO user_roles (user_id, role_name)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Revoke a global role. Returns the number of rows removed.
    pub async fn revoke_global<'e, E>(
        executor: E,
        user_id: UserId,
        role: &RoleName,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            DELETE FROM user_roles
            WHERE user_id = $1 AND role_name = $2 AND target_team_slug IS NULL
            ",
        )
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    user_id: Uuid,
    role_name: String,
    target_team_slug: Option<String>,
}

impl From<RoleRow> for RoleAssignment {
    fn from(row: RoleRow) -> Self {
        Self {
            user_id: UserId::from_uuid(row.user_id),
            role_name: RoleName::new(row.role_name),
            scope: row.target_team_slug.map_or(RoleScope::Global, RoleScope::Team),
        }
    }
}
