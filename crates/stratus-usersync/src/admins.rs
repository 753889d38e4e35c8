//! Administrator role resolution.
//!
//! Active user members of the administrator group hold the global
//! [`RoleName::ADMIN`] role; everyone else loses it. A group the directory
//! does not know about counts as empty, which revokes every administrator.

use std::collections::{BTreeMap, HashMap, HashSet};

use stratus_audit::AuditEvent;
use stratus_core::UserId;
use stratus_db::{LocalUser, RoleName, Session};
use stratus_directory::{DirectoryClient, DirectoryError, GroupMember};
use tracing::instrument;

use crate::error::{UsersyncError, UsersyncResult};
use crate::index::GlobalRoles;

/// Local users that should hold the administrator role, in membership order.
///
/// Members that are not active users are ignored. Members without a synced
/// local user are logged and skipped.
pub(crate) fn target_admins<'a>(
    members: &[GroupMember],
    users_by_external_id: &'a HashMap<String, LocalUser>,
) -> Vec<&'a LocalUser> {
    let mut seen = HashSet::new();
    let mut admins = Vec::new();

    for member in members.iter().filter(|m| m.is_active_user()) {
        let Some(user) = users_by_external_id.get(&member.id) else {
            tracing::error!(
                email = %member.email,
                external_id = %member.id,
                "Unknown user in administrator group"
            );
            continue;
        };
        if seen.insert(user.id) {
            admins.push(user);
        }
    }

    admins
}

/// Members of the administrator group, or none when the group does not exist.
#[instrument(skip(directory))]
pub(crate) async fn admin_group_members(
    directory: &dyn DirectoryClient,
    group_key: &str,
) -> UsersyncResult<Vec<GroupMember>> {
    match directory.list_group_members(group_key).await {
        Ok(members) => Ok(members),
        Err(DirectoryError::GroupNotFound { .. }) => {
            tracing::warn!(
                group_key,
                "Administrator group does not exist, revoking all administrators"
            );
            Ok(Vec::new())
        }
        Err(source) => Err(UsersyncError::ListAdminGroup {
            group_key: group_key.to_string(),
            source,
        }),
    }
}

/// Revoke the administrator role from holders outside `targets`, then grant
/// it to targets that lack it. `roles` must already exclude deleted users.
pub(crate) async fn apply_admins(
    session: &mut dyn Session,
    targets: &[&LocalUser],
    users_by_id: &HashMap<UserId, &LocalUser>,
    roles: &mut GlobalRoles,
    events: &mut Vec<AuditEvent>,
) -> UsersyncResult<()> {
    let target_ids: HashSet<UserId> = targets.iter().map(|u| u.id).collect();

    let mut revoke: BTreeMap<&str, &LocalUser> = BTreeMap::new();
    for holder in roles.holders(&RoleName::ADMIN) {
        if target_ids.contains(&holder) {
            continue;
        }
        match users_by_id.get(&holder) {
            Some(&user) => {
                revoke.insert(user.email.as_str(), user);
            }
            None => tracing::warn!(user_id = %holder, "Administrator without a synced user, skipping"),
        }
    }

    for user in revoke.into_values() {
        tracing::debug!(email = %user.email, "Revoke administrator role");
        session
            .revoke_global_role(user.id, &RoleName::ADMIN)
            .await
            .map_err(|source| UsersyncError::RevokeRole {
                email: user.email.clone(),
                role: RoleName::ADMIN.to_string(),
                source,
            })?;
        roles.revoke(user.id, &RoleName::ADMIN);
        events.push(AuditEvent::RoleRevoked {
            email: user.email.clone(),
            role: RoleName::ADMIN.to_string(),
        });
    }

    for user in targets {
        if roles.has(user.id, &RoleName::ADMIN) {
            continue;
        }
        tracing::debug!(email = %user.email, "Assign administrator role");
        session
            .assign_global_role(user.id, &RoleName::ADMIN)
            .await
            .map_err(|source| UsersyncError::AssignRole {
                email: user.email.clone(),
                role: RoleName::ADMIN.to_string(),
                source,
            })?;
        roles.grant(user.id, RoleName::ADMIN);
        events.push(AuditEvent::RoleAssigned {
            email: user.email.clone(),
            role: RoleName::ADMIN.to_string(),
        });
    }

    Ok(())
}
