//! The user sync engine.
//!
//! One run reads the directory's users and the local users and roles,
//! deletes local users the directory no longer has, updates and then creates
//! the rest, grants default roles, resolves administrators and commits. All of
//! it happens in a single [`Session`]; audit entries are collected while
//! the run proceeds and only handed to the audit sink after commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use stratus_audit::{flush_entries, AuditEvent, AuditLogEntry, AuditSink};
use stratus_core::{CorrelationId, UserId};
use stratus_db::{LocalUser, NewUser, RoleAssignment, Session, StateStore};
use stratus_directory::{DirectoryClient, RemoteUser};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::admins;
use crate::config::UsersyncConfig;
use crate::error::{UsersyncError, UsersyncResult};
use crate::index::{is_outdated, GlobalRoles, LocalIndex};
use crate::runs::{RunTracker, SyncRun};

/// Synchronizes local users and roles with the external directory.
pub struct Usersyncer {
    store: Arc<dyn StateStore>,
    directory: Arc<dyn DirectoryClient>,
    audit: Arc<dyn AuditSink>,
    runs: RunTracker,
    config: UsersyncConfig,
}

impl Usersyncer {
    pub fn new(
        store: Arc<dyn StateStore>,
        directory: Arc<dyn DirectoryClient>,
        audit: Arc<dyn AuditSink>,
        config: UsersyncConfig,
    ) -> Self {
        Self {
            runs: RunTracker::new(config.runs_to_store),
            store,
            directory,
            audit,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &UsersyncConfig {
        &self.config
    }

    #[must_use]
    pub fn run_tracker(&self) -> &RunTracker {
        &self.runs
    }

    /// Run history, most recent first.
    #[must_use]
    pub fn get_runs(&self) -> Vec<SyncRun> {
        self.runs.get_runs()
    }

    /// Run one reconciliation pass.
    pub async fn sync(&self, correlation_id: CorrelationId) -> UsersyncResult<()> {
        self.sync_until_cancelled(correlation_id, &CancellationToken::new())
            .await
    }

    /// Run one reconciliation pass, aborting when `cancel` fires or the run
    /// timeout elapses.
    ///
    /// Aborting drops the open session, which discards its changes. Every
    /// run that gets past correlation id validation ends up in the run
    /// history as either a success or a failure.
    #[instrument(skip(self, cancel), fields(correlation_id = %correlation_id))]
    pub async fn sync_until_cancelled(
        &self,
        correlation_id: CorrelationId,
        cancel: &CancellationToken,
    ) -> UsersyncResult<()> {
        if correlation_id.is_nil() {
            return Err(UsersyncError::InvalidCorrelationId(correlation_id));
        }

        let run = self.runs.start_new_run(correlation_id);
        let started = Instant::now();
        let timeout = self.config.run_timeout();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(UsersyncError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.reconcile()) => {
                outcome.unwrap_or(Err(UsersyncError::TimedOut(timeout)))
            }
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let events = match result {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, duration_ms, "User sync failed");
                run.finish_with_error(&e);
                return Err(e);
            }
        };

        run.finish();
        tracing::info!(changes = events.len(), duration_ms, "User sync completed");

        let entries: Vec<AuditLogEntry> = events
            .iter()
            .map(|event| AuditLogEntry::from_event(correlation_id, event))
            .collect();
        let report = flush_entries(
            self.audit.as_ref(),
            &entries,
            self.config.audit_flush_timeout(),
        )
        .await;
        if !report.is_complete() {
            tracing::error!(
                delivered = report.delivered,
                failed = report.failed,
                "Audit entries for committed user sync were not all written"
            );
        }

        Ok(())
    }

    /// Apply one pass inside a single session and commit it. Returns the
    /// audit events of the committed changes, in the order they were made.
    async fn reconcile(&self) -> UsersyncResult<Vec<AuditEvent>> {
        let mut session = self
            .store
            .begin()
            .await
            .map_err(UsersyncError::BeginSession)?;

        let (remote_users, (local_users, assignments)) = tokio::try_join!(
            self.fetch_remote_users(),
            load_local_state(session.as_mut()),
        )?;

        let mut events = Vec::new();
        let mut roles = GlobalRoles::new(assignments);
        let mut index = LocalIndex::new(local_users);

        let matches = index.resolve(&remote_users);

        // Deleting first frees e-mail addresses that surviving users may
        // move to.
        for user in index.into_unclaimed() {
            delete_user(session.as_mut(), &user, &mut events).await?;
            roles.remove_user(user.id);
        }

        // Updates go before creates so a new user can take an e-mail an
        // existing user is moving away from.
        let mut users_by_external_id: HashMap<String, LocalUser> =
            HashMap::with_capacity(remote_users.len());
        let mut unmatched = Vec::new();
        for (remote, local) in remote_users.iter().zip(matches) {
            let Some(local) = local else {
                unmatched.push(remote);
                continue;
            };
            let user = update_user(session.as_mut(), local, remote, &mut events).await?;
            self.assign_default_roles(session.as_mut(), &user, &mut roles).await?;
            users_by_external_id.insert(remote.external_id.clone(), user);
        }
        for remote in unmatched {
            let user = create_user(session.as_mut(), remote, &mut events).await?;
            self.assign_default_roles(session.as_mut(), &user, &mut roles).await?;
            users_by_external_id.insert(remote.external_id.clone(), user);
        }

        let members =
            admins::admin_group_members(self.directory.as_ref(), &self.config.admin_group_key())
                .await?;
        let targets = admins::target_admins(&members, &users_by_external_id);
        let users_by_id: HashMap<UserId, &LocalUser> = users_by_external_id
            .values()
            .map(|user| (user.id, user))
            .collect();
        admins::apply_admins(
            session.as_mut(),
            &targets,
            &users_by_id,
            &mut roles,
            &mut events,
        )
        .await?;

        session.commit().await.map_err(UsersyncError::Commit)?;

        Ok(events)
    }

    async fn fetch_remote_users(&self) -> UsersyncResult<Vec<RemoteUser>> {
        let started = Instant::now();
        let users = self
            .directory
            .list_users(&self.config.tenant_domain)
            .await
            .map_err(UsersyncError::ListRemoteUsers)?;

        tracing::debug!(
            num_users = users.len(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Fetched users from directory"
        );
        Ok(users)
    }

    /// Grant the default roles `user` lacks. Grants are not audited.
    async fn assign_default_roles(
        &self,
        session: &mut dyn Session,
        user: &LocalUser,
        roles: &mut GlobalRoles,
    ) -> UsersyncResult<()> {
        for role in &self.config.default_roles {
            if roles.has(user.id, role) {
                continue;
            }
            session
                .assign_global_role(user.id, role)
                .await
                .map_err(|source| UsersyncError::AssignRole {
                    email: user.email.clone(),
                    role: role.to_string(),
                    source,
                })?;
            tracing::debug!(email = %user.email, role = %role, "Assign default role");
            roles.grant(user.id, role.clone());
        }
        Ok(())
    }
}

async fn load_local_state(
    session: &mut dyn Session,
) -> UsersyncResult<(Vec<LocalUser>, Vec<RoleAssignment>)> {
    let users = session
        .list_users()
        .await
        .map_err(UsersyncError::LoadLocalState)?;
    let roles = session
        .list_user_roles()
        .await
        .map_err(UsersyncError::LoadLocalState)?;
    Ok((users, roles))
}

async fn create_user(
    session: &mut dyn Session,
    remote: &RemoteUser,
    events: &mut Vec<AuditEvent>,
) -> UsersyncResult<LocalUser> {
    tracing::debug!(email = %remote.primary_email, external_id = %remote.external_id, "Create user");
    let user = session
        .create_user(&NewUser {
            external_id: remote.external_id.clone(),
            email: remote.primary_email.to_lowercase(),
            name: remote.full_name.clone(),
        })
        .await
        .map_err(|source| UsersyncError::CreateUser {
            email: remote.primary_email.clone(),
            source,
        })?;

    events.push(AuditEvent::UserCreated {
        email: user.email.clone(),
        name: user.name.clone(),
    });
    Ok(user)
}

async fn update_user(
    session: &mut dyn Session,
    local: LocalUser,
    remote: &RemoteUser,
    events: &mut Vec<AuditEvent>,
) -> UsersyncResult<LocalUser> {
    if !is_outdated(&local, remote) {
        return Ok(local);
    }

    tracing::debug!(
        email = %remote.primary_email,
        old_email = %local.email,
        external_id = %remote.external_id,
        "Update user"
    );
    let updated = LocalUser {
        id: local.id,
        external_id: Some(remote.external_id.clone()),
        email: remote.primary_email.to_lowercase(),
        name: remote.full_name.clone(),
    };
    session
        .update_user(&updated)
        .await
        .map_err(|source| UsersyncError::UpdateUser {
            email: remote.primary_email.clone(),
            source,
        })?;

    events.push(AuditEvent::UserUpdated {
        email: updated.email.clone(),
        name: updated.name.clone(),
        old_email: local.email,
        old_name: local.name,
    });
    Ok(updated)
}

async fn delete_user(
    session: &mut dyn Session,
    user: &LocalUser,
    events: &mut Vec<AuditEvent>,
) -> UsersyncResult<()> {
    tracing::debug!(email = %user.email, "Delete user");
    session
        .delete_user(user.id)
        .await
        .map_err(|source| UsersyncError::DeleteUser {
            email: user.email.clone(),
            source,
        })?;

    events.push(AuditEvent::UserDeleted {
        email: user.email.clone(),
        name: user.name.clone(),
    });
    Ok(())
}
