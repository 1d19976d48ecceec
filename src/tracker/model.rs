//! Wire types for the Jira REST and Agile APIs.
//!
//! Only the envelope and the fields this crate reads are typed. Issue fields
//! stay a JSON map because custom field ids differ per site.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::history::ChangeEvent;
use crate::timestamp::{parse_timestamp, TimestampError};

/// A board sprint (`/rest/agile/1.0/board/{id}/sprint`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub complete_date: Option<String>,
    #[serde(default)]
    pub origin_board_id: Option<u64>,
}

impl Sprint {
    /// The sprint's end instant, used as the status cutoff.
    ///
    /// `Ok(None)` for sprints that were never scheduled (no end date).
    pub fn cutoff(&self) -> Result<Option<DateTime<Utc>>, TimestampError> {
        self.end_date.as_deref().map(parse_timestamp).transpose()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintPage {
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub is_last: bool,
    #[serde(default)]
    pub values: Vec<Sprint>,
}

/// An issue from `/rest/api/3/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// One page of `/rest/api/3/issue/{id}/changelog`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogPage {
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub is_last: Option<bool>,
    #[serde(default)]
    pub values: Vec<ChangelogEntry>,
}

impl ChangelogPage {
    /// Whether another page must be requested after this one.
    pub fn has_more(&self) -> bool {
        if self.values.is_empty() {
            return false;
        }
        match (self.is_last, self.total) {
            (Some(is_last), _) => !is_last,
            (None, Some(total)) => self.start_at.unwrap_or(0) + (self.values.len() as u64) < total,
            (None, None) => false,
        }
    }
}

/// A changelog entry: one edit, possibly touching several fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangelogEntry {
    /// Missing or null flattens to an empty timestamp, which the resolver skips.
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub items: Vec<ChangeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeItem {
    pub field: String,
    #[serde(rename = "toString", default)]
    pub to_value: Option<String>,
}

impl ChangelogEntry {
    /// One change event per item; every item shares the entry's timestamp.
    pub fn events(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        self.items.iter().map(move |item| {
            ChangeEvent::new(
                self.created.clone().unwrap_or_default(),
                item.field.clone(),
                item.to_value.clone().unwrap_or_default(),
            )
        })
    }
}

/// Flatten changelog entries into change events, preserving arrival order.
pub fn flatten_changelog(entries: &[ChangelogEntry]) -> Vec<ChangeEvent> {
    entries.iter().flat_map(ChangelogEntry::events).collect()
}

/// `/rest/api/3/issue/{key}?expand=names`
#[derive(Debug, Deserialize)]
pub struct NamesResponse {
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}
