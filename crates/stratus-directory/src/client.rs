//! The directory interface reconciliation depends on.

use async_trait::async_trait;

use crate::error::DirectoryResult;
use crate::types::{GroupMember, RemoteUser};

/// Read access to the external identity directory.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Every non-suspended, non-deleted user of `domain`, across all pages,
    /// in the order the directory returns them.
    async fn list_users(&self, domain: &str) -> DirectoryResult<Vec<RemoteUser>>;

    /// Every member of `group_key`, including derived membership.
    ///
    /// Fails with [`crate::DirectoryError::GroupNotFound`] when the group
    /// does not exist.
    async fn list_group_members(&self, group_key: &str) -> DirectoryResult<Vec<GroupMember>>;
}
