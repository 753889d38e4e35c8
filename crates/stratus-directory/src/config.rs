//! Directory client configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

fn default_base_url() -> String {
    "https://admin.googleapis.com".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Settings for [`crate::HttpDirectoryClient`].
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    pub access_token: String,

    /// Results requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for 502/503/504 responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl DirectoryConfig {
    /// Configuration with defaults for everything but the token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            access_token: access_token.into(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> DirectoryResult<()> {
        if self.access_token.is_empty() {
            return Err(DirectoryError::Config("access_token is required".into()));
        }
        if !(1..=500).contains(&self.page_size) {
            return Err(DirectoryError::Config(format!(
                "page_size must be between 1 and 500, got {}",
                self.page_size
            )));
        }
        url::Url::parse(&self.base_url)?;
        Ok(())
    }
}
