//! sprintmetrics -- sprint and issue metrics extraction for Jira boards.
//!
//! This crate pulls a board's sprints and their issues from the tracker,
//! resolves each issue's status as it stood when the sprint ended, and
//! writes flat rows to CSV and to a SQLite reporting warehouse.

pub mod config;
pub mod export;
pub mod extract;
pub mod history;
pub mod record;
pub mod timestamp;
pub mod tracker;
pub mod warehouse;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::extract::{Extractor, SprintSelection};
use crate::tracker::TrackerApi;
use crate::warehouse::{LoadSummary, Warehouse};

/// Outcome of a full extract-and-load run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub sprints: usize,
    pub issues: usize,
    pub history_failures: usize,
    pub skipped_sprints: usize,
    pub issues_csv_rows: Option<usize>,
    pub sprints_csv_rows: Option<usize>,
    pub warehouse: Option<LoadSummary>,
}

/// Extract the configured board, then write CSV output and load the warehouse.
pub async fn run_extract(config: &Config, tracker: &dyn TrackerApi, now: DateTime<Utc>) -> Result<RunSummary> {
    let board_id = config
        .board
        .board_id
        .context("no board configured (set board.board_id or pass --board)")?;
    let selection = SprintSelection::from(&config.board);

    let report = Extractor::new(tracker, config.fields.clone())
        .concurrency(config.extract.concurrency)
        .strict(config.extract.strict)
        .run(board_id, &selection, now)
        .await?;

    let issues_csv_rows = match &config.output.issues_csv {
        Some(path) => Some(export::write_issues_csv(path, &report.issues)?),
        None => None,
    };
    let sprints_csv_rows = match &config.output.sprints_csv {
        Some(path) => Some(export::write_sprints_csv(path, &report.sprints)?),
        None => None,
    };

    let summary = RunSummary {
        sprints: report.sprints.len(),
        issues: report.issues.len(),
        history_failures: report.history_failures,
        skipped_sprints: report.skipped_sprints,
        issues_csv_rows,
        sprints_csv_rows,
        warehouse: None,
    };

    if !config.warehouse.enabled {
        return Ok(summary);
    }

    tracing::info!(path = %config.warehouse.path.display(), "loading warehouse");
    let path = config.warehouse.path.clone();
    let mode = config.warehouse.mode;
    let load = tokio::task::spawn_blocking(move || {
        let warehouse = Warehouse::open(&path)?;
        warehouse.load(&report.issues, &report.sprints, mode)
    })
    .await
    .context("warehouse load task panicked")??;

    Ok(RunSummary {
        warehouse: Some(load),
        ..summary
    })
}
