//! Shared collaborators for user sync integration tests.
//!
//! Everything runs against the transactional in-memory store, a scripted
//! directory and a recording audit sink.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stratus_audit::{AuditError, AuditLogEntry, AuditResult, AuditSink, InMemoryAuditSink};
use stratus_db::{InMemoryStateStore, LocalUser, DEFAULT_ROLE_NAMES};
use stratus_directory::{
    DirectoryClient, DirectoryError, DirectoryResult, GroupMember, MemberStatus, MemberType,
    RemoteUser,
};
use stratus_usersync::{UsersyncConfig, Usersyncer};

pub const DOMAIN: &str = "example.com";
pub const ADMIN_GROUP: &str = "console-admins@example.com";

/// What the directory answers for the administrator group.
#[derive(Debug, Clone)]
pub enum AdminGroup {
    Members(Vec<GroupMember>),
    NotFound,
    Denied,
}

#[derive(Debug)]
struct Script {
    users: Vec<RemoteUser>,
    users_unavailable: bool,
    admin_group: AdminGroup,
    delay: Option<Duration>,
    user_calls: u32,
    group_keys: Vec<String>,
}

/// Directory whose answers are set by the test.
#[derive(Debug, Clone)]
pub struct ScriptedDirectory {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                users: Vec::new(),
                users_unavailable: false,
                admin_group: AdminGroup::Members(Vec::new()),
                delay: None,
                user_calls: 0,
                group_keys: Vec::new(),
            })),
        }
    }

    pub fn set_users(&self, users: Vec<RemoteUser>) {
        self.script.lock().unwrap().users = users;
    }

    pub fn set_admin_group(&self, group: AdminGroup) {
        self.script.lock().unwrap().admin_group = group;
    }

    /// Answer `list_users` with a 503.
    pub fn fail_users(&self) {
        self.script.lock().unwrap().users_unavailable = true;
    }

    /// Wait this long before answering `list_users`.
    pub fn delay_users(&self, delay: Duration) {
        self.script.lock().unwrap().delay = Some(delay);
    }

    pub fn user_calls(&self) -> u32 {
        self.script.lock().unwrap().user_calls
    }

    pub fn group_keys(&self) -> Vec<String> {
        self.script.lock().unwrap().group_keys.clone()
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn list_users(&self, domain: &str) -> DirectoryResult<Vec<RemoteUser>> {
        assert_eq!(domain, DOMAIN);
        let (delay, result) = {
            let mut script = self.script.lock().unwrap();
            script.user_calls += 1;
            let result = if script.users_unavailable {
                Err(DirectoryError::Api {
                    status: 503,
                    message: "Backend Error".into(),
                })
            } else {
                Ok(script.users.clone())
            };
            (script.delay, result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn list_group_members(&self, group_key: &str) -> DirectoryResult<Vec<GroupMember>> {
        let mut script = self.script.lock().unwrap();
        script.group_keys.push(group_key.to_string());
        match &script.admin_group {
            AdminGroup::Members(members) => Ok(members.clone()),
            AdminGroup::NotFound => Err(DirectoryError::GroupNotFound {
                group_key: group_key.to_string(),
            }),
            AdminGroup::Denied => Err(DirectoryError::Auth("Not Authorized to access this resource".into())),
        }
    }
}

/// Sink that rejects every entry.
#[derive(Debug, Default)]
pub struct RejectingAuditSink;

#[async_trait]
impl AuditSink for RejectingAuditSink {
    async fn log(&self, _entry: &AuditLogEntry) -> AuditResult<()> {
        Err(AuditError::Sink("audit database unavailable".into()))
    }
}

pub fn remote(external_id: &str, email: &str, name: &str) -> RemoteUser {
    RemoteUser {
        external_id: external_id.to_string(),
        primary_email: email.to_string(),
        full_name: name.to_string(),
        suspended: false,
    }
}

pub fn admin_member(external_id: &str, email: &str) -> GroupMember {
    GroupMember {
        id: external_id.to_string(),
        email: email.to_string(),
        member_type: MemberType::User,
        status: MemberStatus::Active,
    }
}

pub fn config() -> UsersyncConfig {
    UsersyncConfig::new(DOMAIN).enabled(true)
}

/// Wires a syncer to fresh collaborators.
pub struct TestContext {
    pub store: InMemoryStateStore,
    pub directory: ScriptedDirectory,
    pub audit: InMemoryAuditSink,
    pub syncer: Arc<Usersyncer>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: UsersyncConfig) -> Self {
        let store = InMemoryStateStore::new();
        let directory = ScriptedDirectory::new();
        let audit = InMemoryAuditSink::new();
        let syncer = Arc::new(Usersyncer::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(audit.clone()),
            config,
        ));
        Self {
            store,
            directory,
            audit,
            syncer,
        }
    }

    /// Seed a user that an earlier run already synced, default roles included.
    pub fn seed_synced_user(&self, external_id: &str, email: &str, name: &str) -> LocalUser {
        let user = self.store.seed_user(name, email, Some(external_id));
        for role in DEFAULT_ROLE_NAMES {
            self.store.seed_global_role(user.id, role);
        }
        user
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
