//! Closed set of audit events and the table that decodes stored rows.
//!
//! Every `(target_type, action)` pair the system writes has exactly one
//! [`AuditEvent`] variant. Rows are turned back into variants through an
//! [`AuditDecoder`], a static table built once and handed to whoever reads
//! the audit log. Pairs missing from the table are rejected.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entry::{AuditAction, AuditTargetType, StoredAuditEntry};
use crate::error::{AuditError, AuditResult};

/// A typed audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    UserCreated {
        email: String,
        name: String,
    },
    UserUpdated {
        email: String,
        name: String,
        old_email: String,
        old_name: String,
    },
    UserDeleted {
        email: String,
        name: String,
    },
    RoleAssigned {
        email: String,
        role: String,
    },
    RoleRevoked {
        email: String,
        role: String,
    },
    ReconcilerRegistered {
        reconciler: String,
    },
    ReconcilerConfigured {
        reconciler: String,
        /// Updated keys, sorted.
        keys: Vec<String>,
    },
}

impl AuditEvent {
    #[must_use]
    pub fn action(&self) -> AuditAction {
        match self {
            Self::UserCreated { .. } => AuditAction::Created,
            Self::UserUpdated { .. } => AuditAction::Updated,
            Self::UserDeleted { .. } => AuditAction::Deleted,
            Self::RoleAssigned { .. } => AuditAction::RoleAssigned,
            Self::RoleRevoked { .. } => AuditAction::RoleRevoked,
            Self::ReconcilerRegistered { .. } => AuditAction::Registered,
            Self::ReconcilerConfigured { .. } => AuditAction::Configured,
        }
    }

    #[must_use]
    pub fn target_type(&self) -> AuditTargetType {
        match self {
            Self::UserCreated { .. }
            | Self::UserUpdated { .. }
            | Self::UserDeleted { .. }
            | Self::RoleAssigned { .. }
            | Self::RoleRevoked { .. } => AuditTargetType::User,
            Self::ReconcilerRegistered { .. } | Self::ReconcilerConfigured { .. } => {
                AuditTargetType::Reconciler
            }
        }
    }

    /// User e-mail for user events, reconciler name otherwise.
    #[must_use]
    pub fn target_identifier(&self) -> &str {
        match self {
            Self::UserCreated { email, .. }
            | Self::UserUpdated { email, .. }
            | Self::UserDeleted { email, .. }
            | Self::RoleAssigned { email, .. }
            | Self::RoleRevoked { email, .. } => email,
            Self::ReconcilerRegistered { reconciler }
            | Self::ReconcilerConfigured { reconciler, .. } => reconciler,
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::UserCreated { .. } => "Created user".to_string(),
            Self::UserUpdated { .. } => "Updated user".to_string(),
            Self::UserDeleted { .. } => "Deleted user".to_string(),
            Self::RoleAssigned { role, .. } => format!("Assigned role {role:?}"),
            Self::RoleRevoked { role, .. } => format!("Revoked role {role:?}"),
            Self::ReconcilerRegistered { .. } => "Registered reconciler".to_string(),
            Self::ReconcilerConfigured { keys, .. } => {
                format!("Configured reconciler: {}", keys.join(", "))
            }
        }
    }

    /// Variant-specific payload stored next to the entry.
    #[must_use]
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::UserCreated { name, .. } | Self::UserDeleted { name, .. } => {
                Some(json!({ "name": name }))
            }
            Self::UserUpdated {
                name,
                old_email,
                old_name,
                ..
            } => Some(json!({
                "name": name,
                "old_email": old_email,
                "old_name": old_name,
            })),
            Self::RoleAssigned { role, .. } | Self::RoleRevoked { role, .. } => {
                Some(json!({ "role": role }))
            }
            Self::ReconcilerRegistered { .. } => None,
            Self::ReconcilerConfigured { keys, .. } => Some(json!({ "keys": keys })),
        }
    }

    /// Decodes a stored row with the standard table.
    pub fn from_row(row: &StoredAuditEntry) -> AuditResult<Self> {
        AuditDecoder::standard().decode(row)
    }
}

/// Function turning one stored row into its event.
pub type DecodeFn = fn(&StoredAuditEntry) -> AuditResult<AuditEvent>;

/// One row of a decoder table.
#[derive(Debug, Clone, Copy)]
pub struct DecoderEntry {
    pub target_type: AuditTargetType,
    pub action: AuditAction,
    pub decode: DecodeFn,
}

static STANDARD_DECODERS: &[DecoderEntry] = &[
    DecoderEntry {
        target_type: AuditTargetType::User,
        action: AuditAction::Created,
        decode: decode_user_created,
    },
    DecoderEntry {
        target_type: AuditTargetType::User,
        action: AuditAction::Updated,
        decode: decode_user_updated,
    },
    DecoderEntry {
        target_type: AuditTargetType::User,
        action: AuditAction::Deleted,
        decode: decode_user_deleted,
    },
    DecoderEntry {
        target_type: AuditTargetType::User,
        action: AuditAction::RoleAssigned,
        decode: decode_role_assigned,
    },
    DecoderEntry {
        target_type: AuditTargetType::User,
        action: AuditAction::RoleRevoked,
        decode: decode_role_revoked,
    },
    DecoderEntry {
        target_type: AuditTargetType::Reconciler,
        action: AuditAction::Registered,
        decode: decode_reconciler_registered,
    },
    DecoderEntry {
        target_type: AuditTargetType::Reconciler,
        action: AuditAction::Configured,
        decode: decode_reconciler_configured,
    },
];

/// Static lookup table from stored `(target_type, action)` to a decoder.
#[derive(Debug, Clone, Copy)]
pub struct AuditDecoder {
    entries: &'static [DecoderEntry],
}

impl AuditDecoder {
    /// Decoder over a caller-provided table.
    #[must_use]
    pub const fn new(entries: &'static [DecoderEntry]) -> Self {
        Self { entries }
    }

    /// Decoder covering every event this crate defines.
    #[must_use]
    pub const fn standard() -> Self {
        Self::new(STANDARD_DECODERS)
    }

    /// Maps a stored row to its event, rejecting pairs not in the table.
    pub fn decode(&self, row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
        let entry = self
            .entries
            .iter()
            .find(|e| {
                e.target_type.as_str() == row.target_type && e.action.as_str() == row.action
            })
            .ok_or_else(|| AuditError::UnknownEvent {
                target_type: row.target_type.clone(),
                action: row.action.clone(),
            })?;
        (entry.decode)(row)
    }
}

fn payload_str(row: &StoredAuditEntry, field: &str) -> AuditResult<String> {
    row.data
        .as_ref()
        .and_then(|d| d.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AuditError::MalformedPayload {
            action: row.action.clone(),
            message: format!("missing string field {field:?}"),
        })
}

fn decode_user_created(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    Ok(AuditEvent::UserCreated {
        email: row.target_identifier.clone(),
        name: payload_str(row, "name")?,
    })
}

fn decode_user_updated(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    Ok(AuditEvent::UserUpdated {
        email: row.target_identifier.clone(),
        name: payload_str(row, "name")?,
        old_email: payload_str(row, "old_email")?,
        old_name: payload_str(row, "old_name")?,
    })
}

fn decode_user_deleted(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    Ok(AuditEvent::UserDeleted {
        email: row.target_identifier.clone(),
        name: payload_str(row, "name")?,
    })
}

fn decode_role_assigned(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    Ok(AuditEvent::RoleAssigned {
        email: row.target_identifier.clone(),
        role: payload_str(row, "role")?,
    })
}

fn decode_role_revoked(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    Ok(AuditEvent::RoleRevoked {
        email: row.target_identifier.clone(),
        role: payload_str(row, "role")?,
    })
}

fn decode_reconciler_registered(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    Ok(AuditEvent::ReconcilerRegistered {
        reconciler: row.target_identifier.clone(),
    })
}

fn decode_reconciler_configured(row: &StoredAuditEntry) -> AuditResult<AuditEvent> {
    let keys = row
        .data
        .as_ref()
        .and_then(|d| d.get("keys"))
        .cloned()
        .ok_or_else(|| AuditError::MalformedPayload {
            action: row.action.clone(),
            message: "missing field \"keys\"".to_string(),
        })?;
    let keys: Vec<String> =
        serde_json::from_value(keys).map_err(|e| AuditError::MalformedPayload {
            action: row.action.clone(),
            message: e.to_string(),
        })?;
    Ok(AuditEvent::ReconcilerConfigured {
        reconciler: row.target_identifier.clone(),
        keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditLogEntry;
    use chrono::Utc;
    use stratus_core::CorrelationId;
    use uuid::Uuid;

    fn stored(entry: &AuditLogEntry) -> StoredAuditEntry {
        StoredAuditEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            correlation_id: entry.correlation_id,
            target_type: entry.target_type.as_str().to_string(),
            target_identifier: entry.target_identifier.clone(),
            action: entry.action.as_str().to_string(),
            message: entry.message.clone(),
            data: entry.data.clone(),
        }
    }

    #[test]
    fn test_every_variant_has_a_decoder() {
        let events = vec![
            AuditEvent::UserCreated {
                email: "a@example.com".into(),
                name: "A".into(),
            },
            AuditEvent::UserUpdated {
                email: "a2@example.com".into(),
                name: "A".into(),
                old_email: "a@example.com".into(),
                old_name: "A".into(),
            },
            AuditEvent::UserDeleted {
                email: "a@example.com".into(),
                name: "A".into(),
            },
            AuditEvent::RoleAssigned {
                email: "a@example.com".into(),
                role: "Admin".into(),
            },
            AuditEvent::RoleRevoked {
                email: "a@example.com".into(),
                role: "Admin".into(),
            },
            AuditEvent::ReconcilerRegistered {
                reconciler: "github:team".into(),
            },
            AuditEvent::ReconcilerConfigured {
                reconciler: "github:team".into(),
                keys: vec!["org".into(), "token".into()],
            },
        ];

        let correlation_id = CorrelationId::new();
        for event in events {
            let row = stored(&AuditLogEntry::from_event(correlation_id, &event));
            assert_eq!(AuditEvent::from_row(&row).unwrap(), event);
        }
    }

    #[test]
    fn test_unknown_pair_is_rejected() {
        let mut row = stored(&AuditLogEntry::from_event(
            CorrelationId::new(),
            &AuditEvent::ReconcilerRegistered {
                reconciler: "x".into(),
            },
        ));
        row.target_type = "user".into();

        let err = AuditEvent::from_row(&row).unwrap_err();
        assert!(matches!(err, AuditError::UnknownEvent { .. }));
    }

    #[test]
    fn test_missing_role_is_malformed() {
        let mut row = stored(&AuditLogEntry::from_event(
            CorrelationId::new(),
            &AuditEvent::RoleAssigned {
                email: "a@example.com".into(),
                role: "Admin".into(),
            },
        ));
        row.data = None;

        let err = AuditEvent::from_row(&row).unwrap_err();
        assert!(matches!(err, AuditError::MalformedPayload { .. }));
    }

    #[test]
    fn test_restricted_table_rejects_omitted_pairs() {
        static USERS_ONLY: &[DecoderEntry] = &[DecoderEntry {
            target_type: AuditTargetType::User,
            action: AuditAction::Created,
            decode: decode_user_created,
        }];
        let decoder = AuditDecoder::new(USERS_ONLY);

        let row = stored(&AuditLogEntry::from_event(
            CorrelationId::new(),
            &AuditEvent::UserDeleted {
                email: "a@example.com".into(),
                name: "A".into(),
            },
        ));
        assert!(decoder.decode(&row).is_err());
    }
}
