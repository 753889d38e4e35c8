//! External identity directory access for stratus.
//!
//! [`DirectoryClient`] is the seam reconciliation is written against;
//! [`HttpDirectoryClient`] implements it over the Admin Directory REST API.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::DirectoryClient;
pub use config::DirectoryConfig;
pub use error::{DirectoryError, DirectoryResult};
pub use http::HttpDirectoryClient;
pub use types::{GroupMember, MemberStatus, MemberType, RemoteUser};
