//! CSV output of extracted rows.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::record::{IssueRecord, SprintRecord};

/// Column names of a row type, in serialization order.
///
/// The csv writer derives the header from the first row, so an empty table
/// needs it spelled out.
pub trait CsvColumns {
    const COLUMNS: &'static [&'static str];
}

impl CsvColumns for IssueRecord {
    const COLUMNS: &'static [&'static str] = &[
        "project",
        "sprint_id",
        "sprint",
        "issue_type",
        "id",
        "key",
        "labels",
        "summary",
        "status",
        "current_status",
        "assignee",
        "story_points",
        "epic_link",
        "pair",
        "validator",
        "time_in_status",
        "request_type",
        "start_date",
        "priority",
        "reporter",
        "parent",
        "due_date",
        "resolution_date",
        "created_on",
        "resolution",
        "linked_issues",
    ];
}

impl CsvColumns for SprintRecord {
    const COLUMNS: &'static [&'static str] = &["id", "name", "state", "start_date", "end_date", "board_id"];
}

/// Serialize rows to any writer, header first. Returns the number of rows written.
pub fn write_rows<W: Write, T: Serialize + CsvColumns>(writer: W, rows: &[T]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(T::COLUMNS)?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

fn write_file<T: Serialize + CsvColumns>(path: &Path, rows: &[T]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let written = write_rows(file, rows).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = written, "wrote csv");
    Ok(written)
}

pub fn write_issues_csv(path: &Path, records: &[IssueRecord]) -> Result<usize> {
    write_file(path, records)
}

pub fn write_sprints_csv(path: &Path, sprints: &[SprintRecord]) -> Result<usize> {
    write_file(path, sprints)
}
