//! Matching of directory users to local users.

use std::collections::{BTreeSet, HashMap};

use stratus_core::UserId;
use stratus_db::{LocalUser, RoleAssignment, RoleName};
use stratus_directory::RemoteUser;

/// Local users indexed by external id, and by lower-cased e-mail for
/// users without an external id.
///
/// A local user can be claimed by at most one remote user; once claimed it
/// is no longer reachable through either index.
#[derive(Debug, Default)]
pub(crate) struct LocalIndex {
    users: Vec<Option<LocalUser>>,
    by_external_id: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
}

impl LocalIndex {
    pub(crate) fn new(users: Vec<LocalUser>) -> Self {
        let mut by_external_id = HashMap::with_capacity(users.len());
        let mut by_email = HashMap::new();

        for (idx, user) in users.iter().enumerate() {
            match user.external_id.as_deref().filter(|id| !id.is_empty()) {
                Some(external_id) => {
                    by_external_id.insert(external_id.to_string(), idx);
                }
                None => {
                    by_email.insert(user.email.to_lowercase(), idx);
                }
            }
        }

        Self {
            users: users.into_iter().map(Some).collect(),
            by_external_id,
            by_email,
        }
    }

    /// Local match for each of `remote_users`, index for index.
    ///
    /// Every external id match is taken before any e-mail is looked at, so
    /// a remote user's e-mail can never take a local user that another
    /// remote user owns by external id.
    pub(crate) fn resolve(&mut self, remote_users: &[RemoteUser]) -> Vec<Option<LocalUser>> {
        let mut matches: Vec<Option<LocalUser>> = remote_users
            .iter()
            .map(|remote| Self::take(&mut self.users, self.by_external_id.get(&remote.external_id)))
            .collect();

        for (slot, remote) in matches.iter_mut().zip(remote_users) {
            if slot.is_none() {
                *slot = Self::take(
                    &mut self.users,
                    self.by_email.get(&remote.primary_email.to_lowercase()),
                );
            }
        }

        matches
    }

    fn take(users: &mut [Option<LocalUser>], idx: Option<&usize>) -> Option<LocalUser> {
        idx.and_then(|&idx| users[idx].take())
    }

    /// Local users no remote user claimed, in load order.
    pub(crate) fn into_unclaimed(self) -> Vec<LocalUser> {
        self.users.into_iter().flatten().collect()
    }
}

/// Whether `local` differs from `remote` in name, e-mail or external id.
pub(crate) fn is_outdated(local: &LocalUser, remote: &RemoteUser) -> bool {
    local.name != remote.full_name
        || !local.email.eq_ignore_ascii_case(&remote.primary_email)
        || local.external_id.as_deref() != Some(remote.external_id.as_str())
}

/// Global roles per user, as loaded at the start of a run and kept in step
/// with every grant, revoke and delete the run performs.
#[derive(Debug, Default)]
pub(crate) struct GlobalRoles {
    by_user: HashMap<UserId, BTreeSet<RoleName>>,
}

impl GlobalRoles {
    /// Team-scoped assignments are ignored.
    pub(crate) fn new(assignments: Vec<RoleAssignment>) -> Self {
        let mut by_user: HashMap<UserId, BTreeSet<RoleName>> = HashMap::new();
        for assignment in assignments.into_iter().filter(|a| a.scope.is_global()) {
            by_user
                .entry(assignment.user_id)
                .or_default()
                .insert(assignment.role_name);
        }
        Self { by_user }
    }

    pub(crate) fn has(&self, user_id: UserId, role: &RoleName) -> bool {
        self.by_user
            .get(&user_id)
            .is_some_and(|roles| roles.contains(role))
    }

    pub(crate) fn grant(&mut self, user_id: UserId, role: RoleName) {
        self.by_user.entry(user_id).or_default().insert(role);
    }

    pub(crate) fn revoke(&mut self, user_id: UserId, role: &RoleName) {
        if let Some(roles) = self.by_user.get_mut(&user_id) {
            roles.remove(role);
        }
    }

    /// Forget a deleted user.
    pub(crate) fn remove_user(&mut self, user_id: UserId) {
        self.by_user.remove(&user_id);
    }

    /// Users holding `role` globally.
    pub(crate) fn holders(&self, role: &RoleName) -> Vec<UserId> {
        self.by_user
            .iter()
            .filter(|(_, roles)| roles.contains(role))
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_db::RoleScope;

    fn local(email: &str, external_id: Option<&str>) -> LocalUser {
        LocalUser {
            id: UserId::new(),
            external_id: external_id.map(str::to_string),
            email: email.to_string(),
            name: "Someone".to_string(),
        }
    }

    fn remote(external_id: &str, email: &str) -> RemoteUser {
        RemoteUser {
            external_id: external_id.to_string(),
            primary_email: email.to_string(),
            full_name: "Someone".to_string(),
            suspended: false,
        }
    }

    #[test]
    fn test_external_id_wins_over_email() {
        let by_id = local("old@example.com", Some("1"));
        let by_email = local("new@example.com", None);
        let mut index = LocalIndex::new(vec![by_id.clone(), by_email.clone()]);

        let matches = index.resolve(&[remote("1", "new@example.com")]);

        assert_eq!(matches[0].as_ref().unwrap().id, by_id.id);
        assert_eq!(index.into_unclaimed(), vec![by_email]);
    }

    #[test]
    fn test_external_id_owner_later_in_list_keeps_user() {
        let owned = local("a@example.com", Some("9"));
        let mut index = LocalIndex::new(vec![owned.clone()]);

        let matches = index.resolve(&[
            remote("1", "a@example.com"),
            remote("9", "renamed@example.com"),
        ]);

        assert!(matches[0].is_none());
        assert_eq!(matches[1].as_ref().unwrap().id, owned.id);
    }

    #[test]
    fn test_falls_back_to_email() {
        let user = local("alice@example.com", None);
        let mut index = LocalIndex::new(vec![user.clone()]);

        let matches = index.resolve(&[remote("7", "Alice@Example.com")]);

        assert_eq!(matches[0].as_ref().unwrap().id, user.id);
        assert!(index.into_unclaimed().is_empty());
    }

    #[test]
    fn test_no_email_fallback_for_user_with_external_id() {
        let user = local("alice@example.com", Some("1"));
        let mut index = LocalIndex::new(vec![user.clone()]);

        let matches = index.resolve(&[remote("2", "alice@example.com")]);

        assert!(matches[0].is_none());
        assert_eq!(index.into_unclaimed(), vec![user]);
    }

    #[test]
    fn test_claimed_user_is_not_matched_again() {
        let user = local("alice@example.com", None);
        let mut index = LocalIndex::new(vec![user]);

        let matches = index.resolve(&[
            remote("1", "alice@example.com"),
            remote("2", "alice@example.com"),
        ]);

        assert!(matches[0].is_some());
        assert!(matches[1].is_none());
    }

    #[test]
    fn test_empty_external_id_is_not_indexed() {
        let user = local("alice@example.com", Some(""));
        let mut index = LocalIndex::new(vec![user]);

        let matches = index.resolve(&[remote("", "other@example.com")]);
        assert!(matches[0].is_none());
    }

    #[test]
    fn test_is_outdated() {
        let user = local("alice@example.com", Some("1"));
        assert!(!is_outdated(&user, &remote("1", "ALICE@example.com")));
        assert!(is_outdated(&user, &remote("2", "alice@example.com")));
        assert!(is_outdated(&user, &remote("1", "a2@example.com")));

        let mut renamed = remote("1", "alice@example.com");
        renamed.full_name = "Alice".into();
        assert!(is_outdated(&user, &renamed));

        assert!(is_outdated(&local("alice@example.com", None), &remote("1", "alice@example.com")));
    }

    #[test]
    fn test_global_roles_ignore_team_scope() {
        let alice = UserId::new();
        let bob = UserId::new();
        let roles = GlobalRoles::new(vec![
            RoleAssignment::global(alice, RoleName::ADMIN),
            RoleAssignment {
                user_id: bob,
                role_name: RoleName::ADMIN,
                scope: RoleScope::Team("platform".into()),
            },
        ]);

        assert!(roles.has(alice, &RoleName::ADMIN));
        assert!(!roles.has(bob, &RoleName::ADMIN));
        assert_eq!(roles.holders(&RoleName::ADMIN), vec![alice]);
    }

    #[test]
    fn test_removed_user_holds_nothing() {
        let alice = UserId::new();
        let mut roles = GlobalRoles::new(vec![RoleAssignment::global(alice, RoleName::ADMIN)]);

        roles.remove_user(alice);

        assert!(roles.holders(&RoleName::ADMIN).is_empty());
    }

    #[test]
    fn test_grant_and_revoke() {
        let alice = UserId::new();
        let mut roles = GlobalRoles::default();

        roles.grant(alice, RoleName::TEAM_CREATOR);
        assert!(roles.has(alice, &RoleName::TEAM_CREATOR));

        roles.revoke(alice, &RoleName::TEAM_CREATOR);
        assert!(!roles.has(alice, &RoleName::TEAM_CREATOR));
    }
}
