//! Tracker timestamp parsing.
//!
//! Jira is not consistent about offsets: sprint dates come back as RFC 3339
//! (`2024-09-09T16:00:00.000Z`) while changelog and issue dates use a compact
//! offset (`2024-01-05T10:00:00.000+0000`). Some custom date fields are bare
//! dates.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("unrecognized timestamp '{0}'")]
    Unrecognized(String),
}

const COMPACT_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Parse any timestamp shape the tracker emits into a UTC instant.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimestampError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, COMPACT_OFFSET) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(TimestampError::Unrecognized(s.to_string()))
}

/// Render a date-like tracker value as `YYYY-MM-DD` (UTC), if it parses.
pub fn to_date_string(raw: &str) -> Option<String> {
    parse_timestamp(raw)
        .ok()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}
