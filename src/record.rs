//! Flat export rows and the issue field mapper.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::config::FieldMap;
use crate::tracker::{Issue, Sprint};

/// One issue as it stood at the end of one sprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRecord {
    pub project: Option<String>,
    pub sprint_id: u64,
    pub sprint: String,
    pub issue_type: Option<String>,
    pub id: String,
    pub key: String,
    #[serde(serialize_with = "join_list")]
    pub labels: Vec<String>,
    pub summary: Option<String>,
    /// Status at the sprint's end, replayed from the changelog.
    pub status: Option<String>,
    /// Status at extraction time, for comparison only.
    pub current_status: Option<String>,
    pub assignee: Option<String>,
    pub story_points: Option<f64>,
    pub epic_link: Option<String>,
    pub pair: Option<String>,
    pub validator: Option<String>,
    pub time_in_status: Option<String>,
    pub request_type: Option<String>,
    pub start_date: Option<String>,
    pub priority: Option<String>,
    pub reporter: Option<String>,
    pub parent: Option<String>,
    pub due_date: Option<String>,
    pub resolution_date: Option<String>,
    pub created_on: Option<String>,
    pub resolution: Option<String>,
    #[serde(serialize_with = "join_list")]
    pub linked_issues: Vec<String>,
}

/// Separator for list-valued columns in flat output.
pub const LIST_SEPARATOR: &str = ";";

fn join_list<S: Serializer>(items: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&items.join(LIST_SEPARATOR))
}

impl IssueRecord {
    /// Map a raw issue into a flat row. Missing or null fields become `None`.
    pub fn from_issue(issue: &Issue, sprint: &Sprint, status: Option<String>, map: &FieldMap) -> Self {
        let f = &issue.fields;
        Self {
            project: nested_str(f, "project", "key"),
            sprint_id: sprint.id,
            sprint: sprint.name.clone(),
            issue_type: nested_str(f, "issuetype", "name"),
            id: issue.id.clone(),
            key: issue.key.clone(),
            labels: string_list(f, "labels"),
            summary: text(f, "summary"),
            status,
            current_status: nested_str(f, "status", "name"),
            assignee: nested_str(f, "assignee", "displayName"),
            story_points: number(f, &map.story_points),
            epic_link: text(f, &map.epic_link),
            pair: nested_str(f, &map.pair, "displayName"),
            validator: nested_str(f, &map.validator, "displayName"),
            time_in_status: text(f, &map.time_in_status),
            request_type: text(f, &map.request_type),
            start_date: text(f, &map.start_date),
            priority: nested_str(f, "priority", "name"),
            reporter: nested_str(f, "reporter", "displayName"),
            parent: nested_str(f, "parent", "key"),
            due_date: text(f, "duedate"),
            resolution_date: text(f, "resolutiondate"),
            created_on: text(f, "created"),
            resolution: nested_str(f, "resolution", "name"),
            linked_issues: linked_issue_keys(f),
        }
    }
}

/// Sprint metadata row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintRecord {
    pub id: u64,
    pub name: String,
    pub state: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub board_id: Option<u64>,
}

impl From<&Sprint> for SprintRecord {
    fn from(s: &Sprint) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            state: s.state.clone(),
            start_date: s.start_date.clone(),
            end_date: s.end_date.clone(),
            board_id: s.origin_board_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

fn field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

/// Scalar rendered as text. Option-style objects (`{"value": ..}`) yield their label.
fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    field(fields, key).and_then(value_text)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => ["value", "name", "displayName", "key"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        Value::Array(_) => Some(value.to_string()),
    }
}

fn nested_str(fields: &Map<String, Value>, key: &str, inner: &str) -> Option<String> {
    field(fields, key)?
        .get(inner)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match field(fields, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    field(fields, key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(value_text).collect())
        .unwrap_or_default()
}

/// Keys of linked issues, whichever side of the link they sit on.
fn linked_issue_keys(fields: &Map<String, Value>) -> Vec<String> {
    let Some(links) = field(fields, "issuelinks").and_then(Value::as_array) else {
        return Vec::new();
    };
    links
        .iter()
        .filter_map(|link| {
            link.get("outwardIssue")
                .or_else(|| link.get("inwardIssue"))
                .and_then(|issue| issue.get("key"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}
