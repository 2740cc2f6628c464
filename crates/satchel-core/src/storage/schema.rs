//! SQLite schema for the durable store
//!
//! One table per collection. Each row carries the full record as a JSON
//! body plus duplicated columns for the fields that queries filter or
//! order by.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Courses cached for offline use
        CREATE TABLE IF NOT EXISTS courses (
            course_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            version TEXT NOT NULL,
            downloaded_at INTEGER NOT NULL,
            size INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        -- Per-user, per-course learning progress
        CREATE TABLE IF NOT EXISTS progress (
            key TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            is_pending INTEGER NOT NULL,
            last_update INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        -- Mutating actions recorded for replay
        CREATE TABLE IF NOT EXISTS offline_actions (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            retry_count INTEGER NOT NULL,
            dead INTEGER NOT NULL DEFAULT 0,
            body TEXT NOT NULL
        );

        -- Cached remote profile snapshots
        CREATE TABLE IF NOT EXISTS user_data (
            user_id TEXT PRIMARY KEY,
            last_sync INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        -- Local notification mailbox
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            is_read INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        -- Indexes for common query patterns

        -- Progress lookups by either side of the composite key, and the
        -- pending scan the sync pass runs
        CREATE INDEX IF NOT EXISTS idx_progress_course_id ON progress(course_id);
        CREATE INDEX IF NOT EXISTS idx_progress_user_id ON progress(user_id);
        CREATE INDEX IF NOT EXISTS idx_progress_pending ON progress(is_pending);

        -- FIFO drain and per-kind queries
        CREATE INDEX IF NOT EXISTS idx_actions_kind ON offline_actions(kind);
        CREATE INDEX IF NOT EXISTS idx_actions_timestamp ON offline_actions(timestamp);

        -- Notification mailbox ordering and unread filter
        CREATE INDEX IF NOT EXISTS idx_notifications_timestamp ON notifications(timestamp);
        CREATE INDEX IF NOT EXISTS idx_notifications_read ON notifications(is_read);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    // Check if schema_info table exists
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
