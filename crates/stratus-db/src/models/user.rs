//! Local user model.
//!
//! Users are keyed by an internal id and optionally linked to the external
//! directory through `external_id`. E-mail addresses are stored lower-cased.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use stratus_core::UserId;
use uuid::Uuid;

/// A user as known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: UserId,
    /// Directory id. `None` for rows that predate directory sync.
    pub external_id: Option<String>,
    pub email: String,
    pub name: String,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    external_id: Option<String>,
    email: String,
    name: String,
}

impl From<UserRow> for LocalUser {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            external_id: row.external_id.filter(|e| !e.is_empty()),
            email: row.email,
            name: row.name,
        }
    }
}

impl LocalUser {
    /// Whether `email` matches this user's address, ignoring case.
    #[must_use]
    pub fn has_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }

    /// List every user ordered by e-mail.
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<UserRow> = sqlx::query_as(
            r"
            SELECT id, external_id, email, name
            FROM users
            ORDER BY email ASC
            ",
        )
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(Self::from).collect())
    }

    /// Insert a user, normalising the e-mail to lower case.
    pub async fn create<'e, E>(executor: E, input: &NewUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO users (name, email, external_id)
            VALUES ($1, LOWER($2), $3)
            RETURNING id, external_id, email, name
            ",
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.external_id)
        .fetch_one(executor)
        .await?;

        Ok(row.into())
    }

    /// Overwrite name, e-mail and external id. Returns the number of rows changed.
    pub async fn update<'e, E>(executor: E, user: &LocalUser) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE users
            SET name = $2, email = LOWER($3), external_id = $4
            WHERE id = $1
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.external_id.as_deref())
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete a user. Role assignments cascade with it.
    pub async fn delete<'e, E>(executor: E, id: UserId) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_email_ignores_case() {
        let user = LocalUser {
            id: UserId::new(),
            external_id: Some("1".into()),
            email: "a@example.com".into(),
            name: "A".into(),
        };
        assert!(user.has_email("A@Example.COM"));
        assert!(!user.has_email("b@example.com"));
    }

    #[test]
    fn test_empty_external_id_reads_as_none() {
        let user = LocalUser::from(UserRow {
            id: Uuid::new_v4(),
            external_id: Some(String::new()),
            email: "legacy@example.com".into(),
            name: "Legacy".into(),
        });
        assert_eq!(user.external_id, None);
    }
}
