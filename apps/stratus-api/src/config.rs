//! Configuration management for stratus-api.
//!
//! Loads configuration from environment variables and fails fast on
//! anything missing or malformed.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use stratus_db::RoleName;
use stratus_directory::DirectoryConfig;
use stratus_usersync::UsersyncConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Connections kept in the database pool
    pub database_max_connections: u32,

    /// Log filter directive (e.g., "info,stratus_usersync=debug")
    pub rust_log: String,

    /// User sync engine and scheduler settings
    pub usersync: UsersyncConfig,

    /// Directory API settings. Present whenever an access token is set.
    pub directory: Option<DirectoryConfig>,
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

impl ConfigError {
    fn invalid(var: &str, message: impl Display) -> Self {
        ConfigError::InvalidValue {
            var: var.to_string(),
            message: message.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let database_url = vars.required("DATABASE_URL")?;
        let database_max_connections = vars.parsed("DATABASE_MAX_CONNECTIONS", 10)?;
        let rust_log = vars.get("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let mut usersync = UsersyncConfig::new(vars.required("TENANT_DOMAIN")?)
            .enabled(vars.flag("USERSYNC_ENABLED", false)?);
        if let Some(prefix) = vars.get("USERSYNC_ADMIN_GROUP_PREFIX") {
            usersync.admin_group_prefix = prefix;
        }
        usersync.runs_to_store = vars.parsed("USERSYNC_RUNS_TO_STORE", usersync.runs_to_store)?;
        usersync.interval_secs = vars.parsed("USERSYNC_INTERVAL_SECS", usersync.interval_secs)?;
        usersync.run_timeout_secs =
            vars.parsed("USERSYNC_TIMEOUT_SECS", usersync.run_timeout_secs)?;
        usersync.audit_flush_timeout_secs = vars.parsed(
            "USERSYNC_AUDIT_FLUSH_TIMEOUT_SECS",
            usersync.audit_flush_timeout_secs,
        )?;
        if let Some(roles) = vars.get("USERSYNC_DEFAULT_ROLES") {
            usersync.default_roles = parse_roles(&roles);
        }
        usersync
            .validate()
            .map_err(|e| ConfigError::invalid("USERSYNC", e))?;

        let directory = match vars.get("DIRECTORY_ACCESS_TOKEN") {
            Some(token) => {
                let mut directory = DirectoryConfig::new(token);
                if let Some(base_url) = vars.get("DIRECTORY_BASE_URL") {
                    directory = directory.with_base_url(base_url);
                }
                let page_size = vars.parsed("DIRECTORY_PAGE_SIZE", directory.page_size)?;
                directory = directory.with_page_size(page_size);
                directory
                    .validate()
                    .map_err(|e| ConfigError::invalid("DIRECTORY", e))?;
                Some(directory)
            }
            None if usersync.enabled => {
                return Err(ConfigError::MissingVar(
                    "DIRECTORY_ACCESS_TOKEN".to_string(),
                ));
            }
            None => None,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            rust_log,
            usersync,
            directory,
        })
    }
}

/// Comma-separated role names. Blank entries are skipped.
fn parse_roles(value: &str) -> Vec<RoleName> {
    value
        .split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(RoleName::new)
        .collect()
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value of `name`, treating an empty string as unset.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
    }

    fn parsed<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(name, e)),
            None => Ok(default),
        }
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(name, format!("expected a boolean, got {v:?}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stratus_db::DEFAULT_ROLE_NAMES;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const BASE: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/stratus"),
        ("TENANT_DOMAIN", "example.com"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&BASE).unwrap();

        assert_eq!(config.rust_log, "info");
        assert_eq!(config.database_max_connections, 10);
        assert!(!config.usersync.enabled);
        assert_eq!(config.usersync.tenant_domain, "example.com");
        assert_eq!(
            config.usersync.admin_group_key(),
            "console-admins@example.com"
        );
        assert_eq!(config.usersync.runs_to_store, 5);
        assert_eq!(config.usersync.interval_secs, 900);
        assert_eq!(config.usersync.run_timeout_secs, 30);
        assert_eq!(config.usersync.audit_flush_timeout_secs, 5);
        assert_eq!(config.usersync.default_roles, DEFAULT_ROLE_NAMES.to_vec());
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[("TENANT_DOMAIN", "example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_empty_tenant_domain_is_missing() {
        let err = load(&[("DATABASE_URL", "postgres://x"), ("TENANT_DOMAIN", "")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: TENANT_DOMAIN"
        );
    }

    #[test]
    fn test_enabled_sync_requires_access_token() {
        let mut vars = BASE.to_vec();
        vars.push(("USERSYNC_ENABLED", "true"));

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DIRECTORY_ACCESS_TOKEN"));
    }

    #[test]
    fn test_full_configuration() {
        let mut vars = BASE.to_vec();
        vars.extend([
            ("USERSYNC_ENABLED", "1"),
            ("USERSYNC_ADMIN_GROUP_PREFIX", "ops-admins"),
            ("USERSYNC_RUNS_TO_STORE", "10"),
            ("USERSYNC_INTERVAL_SECS", "60"),
            ("USERSYNC_DEFAULT_ROLES", "Team viewer, ,User viewer"),
            ("DIRECTORY_ACCESS_TOKEN", "token"),
            ("DIRECTORY_BASE_URL", "http://localhost:8080"),
            ("DIRECTORY_PAGE_SIZE", "100"),
        ]);

        let config = load(&vars).unwrap();

        assert!(config.usersync.enabled);
        assert_eq!(config.usersync.admin_group_key(), "ops-admins@example.com");
        assert_eq!(config.usersync.runs_to_store, 10);
        assert_eq!(config.usersync.interval_secs, 60);
        assert_eq!(
            config.usersync.default_roles,
            vec![RoleName::TEAM_VIEWER, RoleName::USER_VIEWER]
        );
        let directory = config.directory.unwrap();
        assert_eq!(directory.base_url, "http://localhost:8080");
        assert_eq!(directory.page_size, 100);
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = BASE.to_vec();
        vars.push(("USERSYNC_INTERVAL_SECS", "soon"));

        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref var, .. } if var == "USERSYNC_INTERVAL_SECS"
        ));
    }

    #[test]
    fn test_invalid_flag() {
        let mut vars = BASE.to_vec();
        vars.push(("USERSYNC_ENABLED", "maybe"));

        let err = load(&vars).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for USERSYNC_ENABLED: expected a boolean, got \"maybe\""
        );
    }

    #[test]
    fn test_zero_runs_to_store_is_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("USERSYNC_RUNS_TO_STORE", "0"));

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_page_size_out_of_range() {
        let mut vars = BASE.to_vec();
        vars.extend([("DIRECTORY_ACCESS_TOKEN", "token"), ("DIRECTORY_PAGE_SIZE", "1000")]);

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref var, .. } if var == "DIRECTORY"));
    }
}
