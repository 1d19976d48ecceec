//! End-to-end extraction: fake tracker -> CSV + warehouse.

mod support;

use chrono::{TimeZone, Utc};

use sprintmetrics::config::Config;
use sprintmetrics::warehouse::{Warehouse, WriteMode};

fn config(base_url: &str, dir: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.tracker.base_url = base_url.to_string();
    cfg.tracker.username = Some(support::USERNAME.to_string());
    cfg.tracker.api_token = Some(support::API_TOKEN.to_string());
    cfg.tracker.page_size = 2;
    cfg.board.board_id = Some(189);
    cfg.board.name_prefixes = vec!["DPE".to_string()];
    cfg.board.closed_only = true;
    cfg.extract.concurrency = 3;
    cfg.output.issues_csv = Some(dir.join("issues.csv"));
    cfg.output.sprints_csv = Some(dir.join("sprints.csv"));
    cfg.warehouse.path = dir.join("warehouse.db");
    cfg.warehouse.mode = WriteMode::ReplaceSprint;
    cfg
}

#[tokio::test]
async fn test_extract_writes_csv_and_warehouse() {
    let base = support::spawn_fake_jira().await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&base, dir.path());
    let client = support::client(&base, cfg.tracker.page_size);
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();

    let summary = sprintmetrics::run_extract(&cfg, &client, now).await.unwrap();

    assert_eq!(summary.sprints, 2);
    assert_eq!(summary.issues, 4);
    assert_eq!(summary.history_failures, 1);
    assert_eq!(summary.issues_csv_rows, Some(4));
    assert_eq!(summary.sprints_csv_rows, Some(2));
    assert_eq!(summary.warehouse.as_ref().unwrap().issues_written, 4);

    let csv = std::fs::read_to_string(dir.path().join("issues.csv")).unwrap();
    assert_eq!(csv.lines().count(), 5);

    let wh = Warehouse::open(&cfg.warehouse.path).unwrap();
    // Closed after sprint 1 ended: the warehouse keeps the status at the cutoff.
    assert_eq!(
        wh.sprint_statuses(1).unwrap(),
        vec![
            ("DPE-42".to_string(), Some("In Progress".to_string())),
            ("DPE-43".to_string(), None),
        ]
    );
    // The entry with an unparseable timestamp is skipped, not fatal.
    assert_eq!(
        wh.sprint_statuses(2).unwrap(),
        vec![
            ("DPE-44".to_string(), Some("In Review".to_string())),
            ("DPE-45".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_rerun_with_replace_sprint_does_not_duplicate() {
    let base = support::spawn_fake_jira().await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&base, dir.path());
    let client = support::client(&base, cfg.tracker.page_size);
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();

    sprintmetrics::run_extract(&cfg, &client, now).await.unwrap();
    let second = sprintmetrics::run_extract(&cfg, &client, now).await.unwrap();

    assert_eq!(second.warehouse.unwrap().rows_removed, 4);
    let wh = Warehouse::open(&cfg.warehouse.path).unwrap();
    assert_eq!(wh.snapshot_count().unwrap(), 4);
}

#[tokio::test]
async fn test_strict_run_fails_without_loading() {
    let base = support::spawn_fake_jira().await;
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&base, dir.path());
    cfg.extract.strict = true;
    let client = support::client(&base, cfg.tracker.page_size);
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();

    let err = sprintmetrics::run_extract(&cfg, &client, now).await.unwrap_err();
    assert!(format!("{err:#}").contains("DPE-45"));
    assert!(!cfg.warehouse.path.exists());
}

#[tokio::test]
async fn test_missing_board_is_reported() {
    let base = support::spawn_fake_jira().await;
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&base, dir.path());
    cfg.board.board_id = None;
    let client = support::client(&base, 2);

    let err = sprintmetrics::run_extract(&cfg, &client, Utc::now()).await.unwrap_err();
    assert!(err.to_string().contains("no board configured"));
}
