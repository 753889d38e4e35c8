//! Persisted audit log entries.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use stratus_audit::{AuditLogEntry, StoredAuditEntry};
use stratus_core::CorrelationId;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    correlation_id: Uuid,
    target_type: String,
    target_identifier: String,
    action: String,
    message: String,
    data: Option<JsonValue>,
}

impl From<AuditLogRow> for StoredAuditEntry {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            correlation_id: CorrelationId::from_uuid(row.correlation_id),
            target_type: row.target_type,
            target_identifier: row.target_identifier,
            action: row.action,
            message: row.message,
            data: row.data,
        }
    }
}

/// Append one entry.
pub async fn insert<'e, E>(executor: E, entry: &AuditLogEntry) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO audit_log
            (correlation_id, target_type, target_identifier, action, message, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(entry.correlation_id.as_uuid())
    .bind(entry.target_type.as_str())
    .bind(&entry.target_identifier)
    .bind(entry.action.as_str())
    .bind(&entry.message)
    .bind(&entry.data)
    .execute(executor)
    .await?;

    Ok(())
}

/// Entries written for one correlation id, oldest first.
pub async fn list_for_correlation<'e, E>(
    executor: E,
    correlation_id: CorrelationId,
) -> Result<Vec<StoredAuditEntry>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<AuditLogRow> = sqlx::query_as(
        r"
        SELECT id, created_at, correlation_id, target_type, target_identifier,
               action, message, data
        FROM audit_log
        WHERE correlation_id = $1
        ORDER BY created_at ASC, id ASC
        ",
    )
    .bind(correlation_id.as_uuid())
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(StoredAuditEntry::from).collect())
}
