//! Reconciler registration for stratus.
//!
//! [`keyed`] holds the diff/apply pass for flat, keyed rows: upsert what is
//! declared, delete what is persisted but no longer declared. The
//! [`ReconcilerRegistry`] uses it to keep a reconciler's configuration keys
//! in step with what the reconciler declares on registration.

pub mod error;
pub mod keyed;
pub mod registry;

pub use error::{ReconcilerError, ReconcilerResult};
pub use keyed::{plan, reconcile_keyed, Keyed, KeyedOutcome, KeyedPlan, KeyedRows};
pub use registry::{ConfigRows, ReconcilerRegistry, Registration};
