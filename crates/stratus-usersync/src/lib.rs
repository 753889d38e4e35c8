//! User and role reconciliation against the external directory.
//!
//! - [`Usersyncer`] runs one reconciliation pass per call inside a single
//!   session and writes audit entries after commit.
//! - [`RunTracker`] keeps a bounded history of runs.
//! - [`UsersyncScheduler`] triggers runs on an interval and on request.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_core::CorrelationId;
//! use stratus_usersync::{Usersyncer, UsersyncConfig};
//!
//! let syncer = Usersyncer::new(store, directory, audit, UsersyncConfig::new("example.com"));
//! syncer.sync(CorrelationId::new()).await?;
//! for run in syncer.get_runs() {
//!     println!("{} {:?}", run.correlation_id, run.status);
//! }
//! ```

mod admins;
pub mod config;
pub mod engine;
pub mod error;
mod index;
pub mod runs;
pub mod scheduler;

pub use config::UsersyncConfig;
pub use engine::Usersyncer;
pub use error::{UsersyncError, UsersyncResult};
pub use runs::{RunHandle, RunStatus, RunTracker, SyncRun};
pub use scheduler::{UsersyncScheduler, UsersyncTrigger};
