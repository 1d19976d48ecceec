//! Extraction pipeline: board sprints -> sprint issues -> changelogs -> flat rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{BoardConfig, FieldMap};
use crate::history::{resolve_status, status_transitions, StatusTransition};
use crate::record::{IssueRecord, SprintRecord};
use crate::timestamp::TimestampError;
use crate::tracker::{Sprint, TrackerApi};

/// Which board sprints get extracted.
#[derive(Debug, Clone, Default)]
pub struct SprintSelection {
    /// Exact sprint names. Empty keeps all.
    pub names: Vec<String>,
    /// Name prefixes. Empty keeps all.
    pub name_prefixes: Vec<String>,
    /// Only sprints whose end date has passed.
    pub closed_only: bool,
}

impl From<&BoardConfig> for SprintSelection {
    fn from(cfg: &BoardConfig) -> Self {
        Self {
            names: cfg.sprint_names.clone(),
            name_prefixes: cfg.name_prefixes.clone(),
            closed_only: cfg.closed_only,
        }
    }
}

impl SprintSelection {
    /// Name filters apply first; the closed-only check fails on an end date
    /// that cannot be parsed instead of dropping the sprint.
    pub fn matches(&self, sprint: &Sprint, now: DateTime<Utc>) -> Result<bool, TimestampError> {
        if !self.names.is_empty() && !self.names.iter().any(|n| n == &sprint.name) {
            return Ok(false);
        }
        if !self.name_prefixes.is_empty()
            && !self.name_prefixes.iter().any(|p| sprint.name.starts_with(p.as_str()))
        {
            return Ok(false);
        }
        if self.closed_only {
            return Ok(matches!(sprint.cutoff()?, Some(end) if end < now));
        }
        Ok(true)
    }
}

/// Everything one extraction run produced.
#[derive(Debug, Default, Serialize)]
pub struct ExtractReport {
    pub sprints: Vec<SprintRecord>,
    pub issues: Vec<IssueRecord>,
    /// Issues recorded without a resolved status because their changelog could not be fetched.
    pub history_failures: usize,
    /// Selected sprints skipped because they have no end date.
    pub skipped_sprints: usize,
}

pub struct Extractor<'a, T: TrackerApi + ?Sized> {
    tracker: &'a T,
    fields: FieldMap,
    concurrency: usize,
    strict: bool,
}

impl<'a, T: TrackerApi + ?Sized> Extractor<'a, T> {
    pub fn new(tracker: &'a T, fields: FieldMap) -> Self {
        Self {
            tracker,
            fields,
            concurrency: 1,
            strict: false,
        }
    }

    /// Changelog fetches in flight at once (minimum 1).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Fail the run on the first changelog that cannot be fetched.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Extract every selected sprint on `board_id`.
    pub async fn run(&self, board_id: u64, selection: &SprintSelection, now: DateTime<Utc>) -> Result<ExtractReport> {
        let sprints = self
            .tracker
            .board_sprints(board_id)
            .await
            .with_context(|| format!("failed to list sprints for board {board_id}"))?;

        let mut report = ExtractReport::default();

        for sprint in &sprints {
            let selected = selection
                .matches(sprint, now)
                .with_context(|| format!("sprint '{}' has an invalid end date", sprint.name))?;
            if !selected {
                continue;
            }
            let cutoff = sprint
                .cutoff()
                .with_context(|| format!("sprint '{}' has an invalid end date", sprint.name))?;
            let Some(cutoff) = cutoff else {
                warn!(sprint = %sprint.name, "sprint has no end date; skipping");
                report.skipped_sprints += 1;
                continue;
            };

            info!(sprint = %sprint.name, id = sprint.id, %cutoff, "extracting sprint");
            let (records, failures) = self.sprint_records(sprint, cutoff).await?;
            debug!(sprint = %sprint.name, issues = records.len(), failures, "sprint extracted");

            report.sprints.push(SprintRecord::from(sprint));
            report.issues.extend(records);
            report.history_failures += failures;
        }

        info!(
            sprints = report.sprints.len(),
            issues = report.issues.len(),
            history_failures = report.history_failures,
            "extraction finished"
        );
        Ok(report)
    }

    /// Flatten one sprint's issues with their status as of `cutoff`.
    pub async fn sprint_records(&self, sprint: &Sprint, cutoff: DateTime<Utc>) -> Result<(Vec<IssueRecord>, usize)> {
        let issues = self
            .tracker
            .sprint_issues(sprint.id)
            .await
            .with_context(|| format!("failed to list issues for sprint '{}'", sprint.name))?;

        let histories: Vec<_> = stream::iter(issues.iter())
            .map(|issue| self.tracker.issue_changelog(&issue.id))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut records = Vec::with_capacity(issues.len());
        let mut failures = 0;

        for (issue, history) in issues.iter().zip(histories) {
            let status = match history {
                Ok(events) => resolve_status(&events, cutoff),
                Err(e) if self.strict => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("failed to fetch changelog for {}", issue.key)));
                }
                Err(e) => {
                    warn!(issue = %issue.key, error = %e, "changelog unavailable; recording issue without resolved status");
                    failures += 1;
                    None
                }
            };
            records.push(IssueRecord::from_issue(issue, sprint, status, &self.fields));
        }

        Ok((records, failures))
    }
}

/// One issue's status at an arbitrary instant, with the timeline it was derived from.
#[derive(Debug, Serialize)]
pub struct IssueStatusReport {
    pub issue: String,
    pub at: DateTime<Utc>,
    pub status: Option<String>,
    pub timeline: Vec<StatusTransition>,
}

pub async fn issue_status_at<T: TrackerApi + ?Sized>(
    tracker: &T,
    issue: &str,
    at: DateTime<Utc>,
) -> Result<IssueStatusReport> {
    let history = tracker
        .issue_changelog(issue)
        .await
        .with_context(|| format!("failed to fetch changelog for {issue}"))?;

    Ok(IssueStatusReport {
        issue: issue.to_string(),
        at,
        status: resolve_status(&history, at),
        timeline: status_transitions(&history),
    })
}
