//! Database models.

pub mod audit_log;
pub mod reconciler;
pub mod role;
pub mod user;

pub use reconciler::{ReconcilerConfigSpec, ReconcilerConfigValue, ReconcilerSpec};
pub use role::{RoleAssignment, RoleName, RoleScope, DEFAULT_ROLE_NAMES};
pub use user::{LocalUser, NewUser};
