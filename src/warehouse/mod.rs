//! SQLite warehouse -- the reporting tables extracted rows are loaded into.

pub mod schema;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::record::{IssueRecord, SprintRecord, LIST_SEPARATOR};
use crate::timestamp::to_date_string;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// What happens to rows already in `issue_snapshots` when a batch is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Keep existing rows; every load adds a new snapshot.
    #[default]
    Append,
    /// Drop existing rows for the sprints in this batch, then insert.
    ReplaceSprint,
    /// Empty the table, then insert.
    Overwrite,
}

/// Counts reported back after a load.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub issues_written: usize,
    pub sprints_written: usize,
    pub rows_removed: usize,
}

#[derive(Clone)]
pub struct Warehouse {
    pool: Pool,
}

impl Warehouse {
    /// Open (or create) the warehouse database and bring the schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });

        let pool = R2D2Pool::new(manager)
            .with_context(|| format!("failed to open warehouse at {}", path.display()))?;

        let conn = pool.get()?;
        schema::migrate(&conn)?;

        Ok(Self { pool })
    }

    /// Load one extraction batch in a single transaction.
    pub fn load(&self, issues: &[IssueRecord], sprints: &[SprintRecord], mode: WriteMode) -> Result<LoadSummary> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut summary = LoadSummary::default();

        match mode {
            WriteMode::Append => {}
            WriteMode::ReplaceSprint => {
                let sprint_ids: BTreeSet<u64> = issues
                    .iter()
                    .map(|r| r.sprint_id)
                    .chain(sprints.iter().map(|s| s.id))
                    .collect();
                for sprint_id in sprint_ids {
                    summary.rows_removed += tx.execute(
                        "DELETE FROM issue_snapshots WHERE sprint_id = ?1",
                        params![sprint_id],
                    )?;
                }
            }
            WriteMode::Overwrite => {
                summary.rows_removed += tx.execute("DELETE FROM issue_snapshots", [])?;
            }
        }

        {
            let mut upsert = tx.prepare(
                "INSERT INTO sprints (id, name, state, start_date, end_date, board_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    state = excluded.state,
                    start_date = excluded.start_date,
                    end_date = excluded.end_date,
                    board_id = excluded.board_id,
                    updated_at = excluded.updated_at",
            )?;
            for s in sprints {
                upsert.execute(params![s.id, s.name, s.state, s.start_date, s.end_date, s.board_id])?;
                summary.sprints_written += 1;
            }

            let loaded_at = Utc::now().to_rfc3339();
            let mut insert = tx.prepare(
                "INSERT INTO issue_snapshots (
                    sprint_id, sprint, issue_id, issue_key, project, issue_type, labels,
                    summary, status, current_status, assignee, story_points, epic_link,
                    pair, validator, time_in_status, request_type, start_date, priority,
                    reporter, parent, due_date, resolution_date, created_on, resolution,
                    linked_issues, loaded_at
                 ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
                 )",
            )?;
            for r in issues {
                insert.execute(params![
                    r.sprint_id,
                    r.sprint,
                    r.id,
                    r.key,
                    r.project,
                    r.issue_type,
                    r.labels.join(LIST_SEPARATOR),
                    r.summary,
                    r.status,
                    r.current_status,
                    r.assignee,
                    r.story_points,
                    r.epic_link,
                    r.pair,
                    r.validator,
                    r.time_in_status,
                    r.request_type,
                    coerce_date(r.start_date.as_deref()),
                    r.priority,
                    r.reporter,
                    r.parent,
                    coerce_date(r.due_date.as_deref()),
                    coerce_date(r.resolution_date.as_deref()),
                    coerce_date(r.created_on.as_deref()),
                    r.resolution,
                    r.linked_issues.join(LIST_SEPARATOR),
                    loaded_at,
                ])?;
                summary.issues_written += 1;
            }
        }

        tx.commit()?;
        tracing::info!(
            issues = summary.issues_written,
            sprints = summary.sprints_written,
            removed = summary.rows_removed,
            ?mode,
            "warehouse load committed"
        );
        Ok(summary)
    }

    /// Resolved status per issue key for one sprint, ordered by key.
    pub fn sprint_statuses(&self, sprint_id: u64) -> Result<Vec<(String, Option<String>)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT issue_key, status FROM issue_snapshots WHERE sprint_id = ?1 ORDER BY issue_key, id",
        )?;
        let rows = stmt
            .query_map(params![sprint_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn snapshot_count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM issue_snapshots", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Date-like columns are stored as `YYYY-MM-DD`; anything unparseable becomes NULL.
fn coerce_date(raw: Option<&str>) -> Option<String> {
    raw.and_then(to_date_string)
}
