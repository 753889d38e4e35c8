//! Error Types
//!
//! Cross-cutting error taxonomy shared by the stratus crates. Component
//! crates keep their own richer enums and convert into this one at the
//! edges where a caller only needs the category.

use serde::Serialize;
use thiserror::Error;

/// Standardized error type for stratus.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StratusError {
    /// A correlation identifier was missing or malformed.
    ///
    /// Raised before any I/O takes place.
    #[error("Invalid correlation id: {value}")]
    InvalidCorrelationId {
        /// The offending value as received
        value: String,
    },

    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "User", "Reconciler")
        resource: String,
        /// Optional identifier of the resource
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Input validation failure.
    #[error("Validation error on field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl StratusError {
    /// Shorthand for a validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a missing resource.
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }
}

/// Type alias for Results using `StratusError`.
pub type Result<T> = std::result::Result<T, StratusError>;
