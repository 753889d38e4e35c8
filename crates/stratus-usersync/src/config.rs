//! User sync configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratus_core::StratusError;
use stratus_db::{RoleName, DEFAULT_ROLE_NAMES};

fn default_admin_group_prefix() -> String {
    "console-admins".to_string()
}

fn default_runs_to_store() -> usize {
    5
}

fn default_roles() -> Vec<RoleName> {
    DEFAULT_ROLE_NAMES.to_vec()
}

fn default_interval_secs() -> u64 {
    15 * 60
}

fn default_first_run_delay_secs() -> u64 {
    1
}

fn default_run_timeout_secs() -> u64 {
    30
}

fn default_audit_flush_timeout_secs() -> u64 {
    5
}

/// Configuration for the user sync engine and its scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersyncConfig {
    /// Whether scheduled and requested runs execute at all.
    #[serde(default)]
    pub enabled: bool,

    /// Directory domain whose users are synchronized.
    pub tenant_domain: String,

    /// Local part of the administrator group address.
    #[serde(default = "default_admin_group_prefix")]
    pub admin_group_prefix: String,

    /// Number of runs kept in history.
    #[serde(default = "default_runs_to_store")]
    pub runs_to_store: usize,

    /// Global roles granted to every synchronized user, in order.
    #[serde(default = "default_roles")]
    pub default_roles: Vec<RoleName>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Delay before the first scheduled run after start.
    #[serde(default = "default_first_run_delay_secs")]
    pub first_run_delay_secs: u64,

    /// Upper bound for one run, including the commit.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// Upper bound for delivering a run's audit entries after commit.
    #[serde(default = "default_audit_flush_timeout_secs")]
    pub audit_flush_timeout_secs: u64,
}

impl UsersyncConfig {
    /// Configuration with defaults for `tenant_domain`. Sync starts disabled.
    pub fn new(tenant_domain: impl Into<String>) -> Self {
        Self {
            enabled: false,
            tenant_domain: tenant_domain.into(),
            admin_group_prefix: default_admin_group_prefix(),
            runs_to_store: default_runs_to_store(),
            default_roles: default_roles(),
            interval_secs: default_interval_secs(),
            first_run_delay_secs: default_first_run_delay_secs(),
            run_timeout_secs: default_run_timeout_secs(),
            audit_flush_timeout_secs: default_audit_flush_timeout_secs(),
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Address of the administrator group, `prefix@tenant_domain`.
    #[must_use]
    pub fn admin_group_key(&self) -> String {
        format!("{}@{}", self.admin_group_prefix, self.tenant_domain)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn first_run_delay(&self) -> Duration {
        Duration::from_secs(self.first_run_delay_secs)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    #[must_use]
    pub fn audit_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_flush_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), StratusError> {
        if self.tenant_domain.trim().is_empty() {
            return Err(StratusError::validation("tenant_domain", "must not be empty"));
        }
        if self.admin_group_prefix.trim().is_empty() {
            return Err(StratusError::validation(
                "admin_group_prefix",
                "must not be empty",
            ));
        }
        if self.runs_to_store == 0 {
            return Err(StratusError::validation(
                "runs_to_store",
                "must be at least 1",
            ));
        }
        if self.interval_secs == 0 {
            return Err(StratusError::validation("interval_secs", "must be at least 1"));
        }
        if self.run_timeout_secs == 0 {
            return Err(StratusError::validation(
                "run_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
