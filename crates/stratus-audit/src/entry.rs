//! Audit log entries as written to a sink and read back from storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratus_core::CorrelationId;
use uuid::Uuid;

use crate::event::AuditEvent;

/// Kind of resource an audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTargetType {
    /// A local user, identified by e-mail.
    User,
    /// A registered reconciler, identified by name.
    Reconciler,
}

impl AuditTargetType {
    /// Stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Reconciler => "reconciler",
        }
    }
}

impl std::fmt::Display for AuditTargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Resource was created.
    Created,
    /// Resource was updated.
    Updated,
    /// Resource was deleted.
    Deleted,
    /// A role was assigned to a user.
    RoleAssigned,
    /// A role was revoked from a user.
    RoleRevoked,
    /// A reconciler was registered or re-registered.
    Registered,
    /// A reconciler's configuration values changed.
    Configured,
}

impl AuditAction {
    /// Stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::RoleAssigned => "role_assigned",
            Self::RoleRevoked => "role_revoked",
            Self::Registered => "registered",
            Self::Configured => "configured",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record produced by a reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// What happened.
    pub action: AuditAction,
    /// Kind of resource affected.
    pub target_type: AuditTargetType,
    /// Identifier of the affected resource (user e-mail, reconciler name).
    pub target_identifier: String,
    /// Correlation identifier of the run that produced the entry.
    pub correlation_id: CorrelationId,
    /// Human readable summary.
    pub message: String,
    /// Variant-specific details (previous values, role name, keys).
    pub data: Option<serde_json::Value>,
}

impl AuditLogEntry {
    /// Builds the entry describing `event` for the given run.
    #[must_use]
    pub fn from_event(correlation_id: CorrelationId, event: &AuditEvent) -> Self {
        Self {
            action: event.action(),
            target_type: event.target_type(),
            target_identifier: event.target_identifier().to_string(),
            correlation_id,
            message: event.message(),
            data: event.data(),
        }
    }
}

/// An audit entry as read back from persistent storage.
///
/// Action and target type stay untyped here; turning them back into an
/// [`AuditEvent`] is the job of [`crate::AuditDecoder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAuditEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub correlation_id: CorrelationId,
    pub target_type: String,
    pub target_identifier: String,
    pub action: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}
