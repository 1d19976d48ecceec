//! Issue change history and the status-at-cutoff resolver.
//!
//! An issue's *current* status says nothing about where it stood when a
//! sprint closed. The resolver replays the changelog instead: the answer is
//! the last status transition at or before the cutoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::timestamp::parse_timestamp;

/// Changelog field name carrying workflow status transitions.
pub const STATUS_FIELD: &str = "status";

/// One field transition from an issue's audit history.
///
/// The timestamp is kept as the raw tracker text so that a single malformed
/// entry can be skipped at resolution time instead of failing the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: String,
    pub field: String,
    /// The value the field transitioned *to*.
    pub value: String,
}

impl ChangeEvent {
    pub fn new(timestamp: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_status(&self) -> bool {
        self.field == STATUS_FIELD
    }
}

/// A status change with a parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub at: DateTime<Utc>,
    pub status: String,
}

/// Status events with parseable timestamps. Unparseable ones are logged and dropped.
fn parsed_status_events(history: &[ChangeEvent]) -> impl Iterator<Item = (DateTime<Utc>, &str)> + '_ {
    history.iter().filter(|e| e.is_status()).filter_map(|e| {
        match parse_timestamp(&e.timestamp) {
            Ok(at) => Some((at, e.value.as_str())),
            Err(err) => {
                warn!(timestamp = %e.timestamp, value = %e.value, error = %err, "skipping status change with unparseable timestamp");
                None
            }
        }
    })
}

/// Resolve the status an issue held at `cutoff`.
///
/// Returns the value of the latest status transition whose timestamp is at or
/// before `cutoff` (inclusive). Transitions sharing the winning timestamp are
/// broken by taking the lexicographically greatest value, so the result never
/// depends on input order. `None` means no transition was recorded by then.
pub fn resolve_status(history: &[ChangeEvent], cutoff: DateTime<Utc>) -> Option<String> {
    parsed_status_events(history)
        .filter(|(at, _)| *at <= cutoff)
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, status)| status.to_string())
}

/// Full status timeline, oldest first, ordered the same way the resolver breaks ties.
pub fn status_transitions(history: &[ChangeEvent]) -> Vec<StatusTransition> {
    let mut transitions: Vec<StatusTransition> = parsed_status_events(history)
        .map(|(at, status)| StatusTransition {
            at,
            status: status.to_string(),
        })
        .collect();
    transitions.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.status.cmp(&b.status)));
    transitions
}
