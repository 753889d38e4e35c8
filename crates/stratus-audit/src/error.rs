//! Error types for the audit crate.

use thiserror::Error;

/// Audit operation errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink could not accept the entry.
    #[error("Audit sink failed: {0}")]
    Sink(String),

    /// Delivery did not finish before the flush deadline.
    #[error("Audit flush timed out")]
    Timeout,

    /// A stored row names a target type and action with no known event.
    #[error("Unknown audit event: target type {target_type:?}, action {action:?}")]
    UnknownEvent {
        /// Stored target type
        target_type: String,
        /// Stored action
        action: String,
    },

    /// A stored row matched a known event but its payload did not.
    #[error("Malformed payload for audit action {action:?}: {message}")]
    MalformedPayload {
        /// Stored action
        action: String,
        /// What was wrong with the payload
        message: String,
    },
}

impl AuditError {
    /// Check if this error came from decoding a stored row.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            AuditError::UnknownEvent { .. } | AuditError::MalformedPayload { .. }
        )
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_display() {
        let err = AuditError::UnknownEvent {
            target_type: "team".into(),
            action: "exploded".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown audit event: target type \"team\", action \"exploded\""
        );
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_sink_errors_are_not_decode_errors() {
        assert!(!AuditError::Timeout.is_decode_error());
        assert!(!AuditError::Sink("down".into()).is_decode_error());
    }
}
