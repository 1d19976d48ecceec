//! In-process fake of the Jira REST endpoints the extractor calls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use sprintmetrics::config::Credentials;
use sprintmetrics::tracker::JiraClient;

pub const USERNAME: &str = "bot";
pub const API_TOKEN: &str = "token";
const EXPECTED_AUTH: &str = "Basic Ym90OnRva2Vu";

type Params = Query<HashMap<String, String>>;

fn authorized(headers: &HeaderMap) -> Result<(), StatusCode> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(EXPECTED_AUTH) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn window(params: &HashMap<String, String>) -> (usize, usize) {
    let start = params.get("startAt").and_then(|v| v.parse().ok()).unwrap_or(0);
    let max = params.get("maxResults").and_then(|v| v.parse().ok()).unwrap_or(50);
    (start, max)
}

fn slice(all: &[Value], start: usize, max: usize) -> (Vec<Value>, bool) {
    let end = (start + max).min(all.len());
    let page = all.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
    (page, end >= all.len())
}

fn sprints() -> Vec<Value> {
    vec![
        json!({
            "id": 1, "state": "closed", "name": "DPE 2024-08-26 to 2024-09-09",
            "startDate": "2024-08-26T16:00:00.000Z", "endDate": "2024-09-09T16:00:00.000Z",
            "originBoardId": 189
        }),
        json!({
            "id": 2, "state": "closed", "name": "DPE 2024-09-09 to 2024-09-23",
            "startDate": "2024-09-09T16:00:00.000Z", "endDate": "2024-09-23T16:00:00.000Z",
            "originBoardId": 189
        }),
        json!({
            "id": 3, "state": "future", "name": "DPE someday",
            "endDate": "2099-01-01T00:00:00.000Z", "originBoardId": 189
        }),
    ]
}

fn issue(id: &str, key: &str, current: &str) -> Value {
    json!({
        "id": id,
        "key": key,
        "fields": {
            "project": { "key": "DPE" },
            "issuetype": { "name": "Story" },
            "summary": format!("Work item {key}"),
            "labels": ["metrics"],
            "status": { "name": current },
            "assignee": null,
            "customfield_10014": 2,
            "customfield_12185": { "displayName": "Pat Pair" },
            "priority": { "name": "Major" },
            "created": "2024-08-20T08:00:00.000+0000",
            "issuelinks": []
        }
    })
}

fn sprint_issues(sprint_id: u64) -> Option<Vec<Value>> {
    match sprint_id {
        1 => Some(vec![issue("10010", "DPE-42", "Closed"), issue("10011", "DPE-43", "Open")]),
        2 => Some(vec![issue("10012", "DPE-44", "Done"), issue("10013", "DPE-45", "Done")]),
        _ => None,
    }
}

fn changelog(issue_id: &str) -> Option<Vec<Value>> {
    match issue_id {
        "10010" => Some(vec![
            json!({ "id": "1", "created": "2024-08-27T09:00:00.000+0000", "items": [
                { "field": "status", "fromString": "Open", "toString": "In Progress" },
                { "field": "assignee", "fromString": null, "toString": "Jane" }
            ]}),
            json!({ "id": "2", "created": "2024-09-12T09:00:00.000+0000", "items": [
                { "field": "status", "fromString": "In Progress", "toString": "Closed" }
            ]}),
        ]),
        "10011" => Some(vec![]),
        "10012" => Some(vec![
            json!({ "id": "3", "created": "2024-09-10T09:00:00.000+0000", "items": [
                { "field": "status", "fromString": "Open", "toString": "In Review" }
            ]}),
            json!({ "id": "4", "created": "not-a-time", "items": [
                { "field": "status", "fromString": "In Review", "toString": "Done" }
            ]}),
        ]),
        _ => None,
    }
}

async fn board_sprints(headers: HeaderMap, Path(board_id): Path<u64>, Query(params): Params) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    let (start, max) = window(&params);
    if board_id == 777 {
        // Always answers with the first window and never reports the last page.
        let (values, _) = slice(&sprints(), 0, max);
        return Ok(Json(json!({ "maxResults": max, "startAt": 0, "isLast": false, "values": values })));
    }
    if board_id != 189 {
        return Err(StatusCode::NOT_FOUND);
    }
    let (values, is_last) = slice(&sprints(), start, max);
    Ok(Json(json!({ "maxResults": max, "startAt": start, "isLast": is_last, "values": values })))
}

async fn search(headers: HeaderMap, Query(params): Params) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    let sprint_id = params
        .get("jql")
        .and_then(|jql| jql.strip_prefix("sprint="))
        .and_then(|id| id.parse().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    let (start, max) = window(&params);
    if sprint_id == 77 {
        // Ignores startAt and leaves it out of the response; total stays ahead of one page.
        let (issues, _) = slice(&sprint_issues(1).unwrap_or_default(), 0, max);
        return Ok(Json(json!({ "maxResults": max, "total": 2, "issues": issues })));
    }
    let all = sprint_issues(sprint_id).ok_or(StatusCode::BAD_REQUEST)?;
    let (issues, _) = slice(&all, start, max);
    Ok(Json(json!({ "startAt": start, "maxResults": max, "total": all.len(), "issues": issues })))
}

async fn issue_changelog(headers: HeaderMap, Path(issue_id): Path<String>, Query(params): Params) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    if issue_id == "10013" {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let all = changelog(&issue_id).ok_or(StatusCode::NOT_FOUND)?;
    let (start, max) = window(&params);
    let (values, is_last) = slice(&all, start, max);
    Ok(Json(json!({
        "startAt": start, "maxResults": max, "total": all.len(), "isLast": is_last, "values": values
    })))
}

async fn issue_names(headers: HeaderMap, Path(key): Path<String>, Query(params): Params) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    if key != "DPE-42" || params.get("expand").map(String::as_str) != Some("names") {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "key": "DPE-42",
        "names": {
            "summary": "Summary",
            "customfield_10014": "Story Points",
            "customfield_12185": "Pair"
        }
    })))
}

fn router() -> Router {
    Router::new()
        .route("/rest/agile/1.0/board/{board_id}/sprint", get(board_sprints))
        .route("/rest/api/3/search", get(search))
        .route("/rest/api/3/issue/{issue_id}/changelog", get(issue_changelog))
        .route("/rest/api/3/issue/{key}", get(issue_names))
}

/// Start the fake tracker on an ephemeral port and return its base URL.
pub async fn spawn_fake_jira() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router()).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn credentials() -> Credentials {
    Credentials {
        username: USERNAME.to_string(),
        api_token: API_TOKEN.to_string(),
    }
}

pub fn client(base_url: &str, page_size: u32) -> JiraClient {
    JiraClient::new(base_url, credentials(), page_size, Duration::from_secs(5)).unwrap()
}
