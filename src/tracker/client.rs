use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::model::{flatten_changelog, ChangelogPage, Issue, NamesResponse, SearchPage, Sprint, SprintPage};
use super::{TrackerApi, TrackerError};
use crate::config::{Credentials, TrackerConfig};
use crate::history::ChangeEvent;

const MAX_ERROR_BODY: usize = 512;

/// Jira Cloud client authenticated with an account email + API token.
pub struct JiraClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    page_size: u32,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TrackerError::Client)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            page_size: page_size.max(1),
        })
    }

    /// Build a client from configuration. Fails if credentials are missing.
    pub fn from_config(cfg: &TrackerConfig) -> anyhow::Result<Self> {
        let credentials = cfg.credentials()?;
        let client = Self::new(
            cfg.base_url()?,
            credentials,
            cfg.page_size,
            Duration::from_secs(cfg.timeout_secs),
        )?;
        Ok(client)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TrackerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?query, "GET");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.api_token))
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|source| TrackerError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                url,
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| TrackerError::Http {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| TrackerError::Decode { url, source })
    }

    /// A server that answers a later page with a different `startAt` is not
    /// paging; stop instead of re-reading the same window forever.
    fn offset_ignored(path: &str, requested: u64, echoed: Option<u64>) -> bool {
        match echoed {
            Some(echoed) if echoed != requested => {
                warn!(path, requested, echoed, "server ignored startAt; stopping pagination");
                true
            }
            _ => false,
        }
    }

    fn page_query(&self, start_at: u64) -> Vec<(&'static str, String)> {
        vec![
            ("startAt", start_at.to_string()),
            ("maxResults", self.page_size.to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl TrackerApi for JiraClient {
    #[instrument(skip(self))]
    async fn board_sprints(&self, board_id: u64) -> Result<Vec<Sprint>, TrackerError> {
        let path = format!("/rest/agile/1.0/board/{board_id}/sprint");
        let mut sprints = Vec::new();
        let mut start_at = 0;

        loop {
            let page: SprintPage = self.get_json(&path, &self.page_query(start_at)).await?;
            if Self::offset_ignored(&path, start_at, page.start_at) {
                break;
            }
            let fetched = page.values.len() as u64;
            sprints.extend(page.values);
            if page.is_last || fetched == 0 {
                break;
            }
            start_at += fetched;
        }

        debug!(count = sprints.len(), "fetched board sprints");
        Ok(sprints)
    }

    #[instrument(skip(self))]
    async fn sprint_issues(&self, sprint_id: u64) -> Result<Vec<Issue>, TrackerError> {
        let mut issues = Vec::new();
        let mut start_at = 0;

        loop {
            let mut query = self.page_query(start_at);
            query.push(("jql", format!("sprint={sprint_id}")));
            query.push(("fields", "*all".to_string()));

            let page: SearchPage = self.get_json("/rest/api/3/search", &query).await?;
            if Self::offset_ignored("/rest/api/3/search", start_at, page.start_at) {
                break;
            }
            let fetched = page.issues.len() as u64;
            issues.extend(page.issues);
            start_at += fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }

        debug!(count = issues.len(), "fetched sprint issues");
        Ok(issues)
    }

    #[instrument(skip(self))]
    async fn issue_changelog(&self, issue_id: &str) -> Result<Vec<ChangeEvent>, TrackerError> {
        let path = format!("/rest/api/3/issue/{issue_id}/changelog");
        let mut events = Vec::new();
        let mut start_at = 0;

        loop {
            let page: ChangelogPage = self.get_json(&path, &self.page_query(start_at)).await?;
            if Self::offset_ignored(&path, start_at, page.start_at) {
                break;
            }
            events.extend(flatten_changelog(&page.values));
            if !page.has_more() {
                break;
            }
            start_at += page.values.len() as u64;
        }

        Ok(events)
    }

    #[instrument(skip(self))]
    async fn field_names(&self, issue_key: &str) -> Result<BTreeMap<String, String>, TrackerError> {
        let path = format!("/rest/api/3/issue/{issue_key}");
        let response: NamesResponse = self
            .get_json(&path, &[("expand", "names".to_string())])
            .await?;
        Ok(response.names)
    }
}
