//! Warehouse schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sprints (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            state TEXT,
            start_date TEXT,
            end_date TEXT,
            board_id INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS issue_snapshots (
            id INTEGER PRIMARY KEY,
            sprint_id INTEGER NOT NULL,
            sprint TEXT NOT NULL,
            issue_id TEXT NOT NULL,
            issue_key TEXT NOT NULL,
            project TEXT,
            issue_type TEXT,
            labels TEXT NOT NULL DEFAULT '',
            summary TEXT,
            status TEXT,
            current_status TEXT,
            assignee TEXT,
            story_points REAL,
            epic_link TEXT,
            pair TEXT,
            validator TEXT,
            time_in_status TEXT,
            request_type TEXT,
            start_date TEXT,
            priority TEXT,
            reporter TEXT,
            parent TEXT,
            due_date TEXT,
            resolution_date TEXT,
            created_on TEXT,
            resolution TEXT,
            linked_issues TEXT NOT NULL DEFAULT '',
            loaded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_issue_snapshots_sprint ON issue_snapshots(sprint_id);
        CREATE INDEX IF NOT EXISTS idx_issue_snapshots_key ON issue_snapshots(issue_key);
        CREATE INDEX IF NOT EXISTS idx_sprints_board ON sprints(board_id);",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM issue_snapshots", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sprints", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should not error
    }

    #[test]
    fn test_snapshot_columns_include_both_statuses() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info('issue_snapshots') ORDER BY cid")
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let status = columns.iter().position(|c| c == "status").unwrap();
        assert_eq!(columns[status + 1], "current_status");
        assert!(columns.contains(&"linked_issues".to_string()));
    }
}
