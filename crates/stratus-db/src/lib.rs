//! Persistent state for stratus.
//!
//! - [`models`] - users, role assignments, reconciler rows and their SQL
//! - [`session`] - the [`StateStore`] / [`Session`] unit-of-work traits
//! - [`postgres`] - `PostgreSQL` implementation
//! - [`migrations`] - embedded schema migrations
//! - [`memory`] - transactional in-memory implementation for tests
//! - [`audit_sink`] - audit log table as an [`stratus_audit::AuditSink`]

pub mod audit_sink;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod session;

pub use audit_sink::PgAuditSink;
pub use error::{DbError, DbResult};
pub use memory::{InMemoryStateStore, MemoryState, StoreOp};
pub use migrations::run_migrations;
pub use models::{
    LocalUser, NewUser, ReconcilerConfigSpec, ReconcilerConfigValue, ReconcilerSpec,
    RoleAssignment, RoleName, RoleScope, DEFAULT_ROLE_NAMES,
};
pub use postgres::{PgSession, PgStateStore};
pub use session::{Session, StateStore};
