//! stratus Core Library
//!
//! Shared types for the stratus control plane.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`UserId`, `CorrelationId`)
//! - [`error`] - Standardized error types (`StratusError`)
//!
//! # Example
//!
//! ```
//! use stratus_core::{CorrelationId, Result, StratusError};
//!
//! fn check(id: CorrelationId) -> Result<()> {
//!     if id.is_nil() {
//!         return Err(StratusError::InvalidCorrelationId { value: id.to_string() });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(CorrelationId::new()).is_ok());
//! ```

pub mod error;
pub mod ids;

pub use error::{Result, StratusError};
pub use ids::{CorrelationId, ParseIdError, UserId};
