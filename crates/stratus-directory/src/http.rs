//! HTTP client for an Admin-Directory-style REST API with pagination and
//! retry of transient failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::client::DirectoryClient;
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{ApiErrorResponse, ApiMember, ApiUser, GroupMember, Page, RemoteUser};

/// Member listings are capped lower than user listings by the API.
const MAX_MEMBERS_PAGE_SIZE: u32 = 200;

/// Directory client speaking HTTP.
#[derive(Debug)]
pub struct HttpDirectoryClient {
    http_client: reqwest::Client,
    config: DirectoryConfig,
    initial_retry_delay: Duration,
}

impl HttpDirectoryClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DirectoryError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
            initial_retry_delay: Duration::from_millis(500),
        })
    }

    /// Overrides the first backoff delay.
    #[must_use]
    pub fn with_initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    fn endpoint(&self, path: &str) -> DirectoryResult<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/admin/directory/v1/{path}"))?)
    }

    fn users_url(&self, domain: &str, page_token: Option<&str>) -> DirectoryResult<Url> {
        let mut url = self.endpoint("users")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("domain", domain)
                .append_pair("showDeleted", "false")
                .append_pair("query", "isSuspended=false")
                .append_pair("maxResults", &self.config.page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    fn members_url(&self, group_key: &str, page_token: Option<&str>) -> DirectoryResult<Url> {
        let mut url = self.endpoint(&format!(
            "groups/{}/members",
            urlencoding::encode(group_key)
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("includeDerivedMembership", "true")
                .append_pair(
                    "maxResults",
                    &self.config.page_size.min(MAX_MEMBERS_PAGE_SIZE).to_string(),
                );
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    /// Performs a GET request, retrying 502/503/504 with exponential backoff.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> DirectoryResult<T> {
        let mut retries = 0;
        let mut delay = self.initial_retry_delay;

        loop {
            let response = self
                .http_client
                .get(url.clone())
                .bearer_auth(&self.config.access_token)
                .send()
                .await?;
            let status = response.status();

            if matches!(
                status,
                reqwest::StatusCode::BAD_GATEWAY
                    | reqwest::StatusCode::SERVICE_UNAVAILABLE
                    | reqwest::StatusCode::GATEWAY_TIMEOUT
            ) && retries < self.config.max_retries
            {
                retries += 1;
                warn!(
                    %status,
                    retry = retries,
                    max_retries = self.config.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Transient directory error, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            if status.is_success() {
                let body = response.text().await?;
                return Ok(serde_json::from_str(&body)?);
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    DirectoryError::Auth(message)
                }
                _ => DirectoryError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }
    }

    /// Follows `nextPageToken` until exhausted, collecting every item.
    ///
    /// `first_page_error` rewrites errors from the first request only; a
    /// failure on a later page is returned as is.
    async fn get_paginated<T, F, E>(
        &self,
        build_url: F,
        first_page_error: E,
    ) -> DirectoryResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(Option<&str>) -> DirectoryResult<Url>,
        E: Fn(DirectoryError) -> DirectoryError,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = build_url(page_token.as_deref())?;
            debug!(%url, "Fetching page");
            let page: Page<T> = match self.get(url).await {
                Ok(page) => page,
                Err(e) if page_token.is_none() => return Err(first_page_error(e)),
                Err(e) => return Err(e),
            };
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    #[instrument(skip(self))]
    async fn list_users(&self, domain: &str) -> DirectoryResult<Vec<RemoteUser>> {
        let users: Vec<ApiUser> = self
            .get_paginated(|token| self.users_url(domain, token), std::convert::identity)
            .await?;

        let users: Vec<RemoteUser> = users
            .into_iter()
            .map(RemoteUser::from)
            .filter(|u| !u.suspended)
            .collect();

        debug!(num_users = users.len(), "Listed directory users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn list_group_members(&self, group_key: &str) -> DirectoryResult<Vec<GroupMember>> {
        let members: Vec<ApiMember> = self
            .get_paginated(
                |token| self.members_url(group_key, token),
                |e| match e {
                    DirectoryError::Api { status: 404, .. } => DirectoryError::GroupNotFound {
                        group_key: group_key.to_string(),
                    },
                    other => other,
                },
            )
            .await?;

        Ok(members.into_iter().map(GroupMember::from).collect())
    }
}
