//! Issue tracker access: wire model, API trait, and the HTTP client.

pub mod client;
pub mod model;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::history::ChangeEvent;

pub use self::client::JiraClient;
pub use self::model::{Issue, Sprint};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only view of the tracker used by the extraction pipeline.
///
/// Every method returns fully paginated results.
#[async_trait::async_trait]
pub trait TrackerApi: Send + Sync {
    /// All sprints on a board, in tracker order.
    async fn board_sprints(&self, board_id: u64) -> Result<Vec<Sprint>, TrackerError>;

    /// All issues that were part of a sprint.
    async fn sprint_issues(&self, sprint_id: u64) -> Result<Vec<Issue>, TrackerError>;

    /// An issue's complete change history, flattened to one event per field change.
    async fn issue_changelog(&self, issue_id: &str) -> Result<Vec<ChangeEvent>, TrackerError>;

    /// Field id to display name (e.g. `customfield_10014` -> `Story Points`).
    async fn field_names(&self, issue_key: &str) -> Result<BTreeMap<String, String>, TrackerError>;
}
