//! Durable keyed store over SQLite
//!
//! The store backs every other component. `open` never fails: when the
//! database cannot be opened the store runs disabled, where reads
//! return empty results and writes are accepted and dropped. Callers
//! never see a storage error; failures are logged and converted to
//! safe defaults.
//!
//! All operations are atomic with respect to a single record. No
//! multi-collection transactions are offered.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::config::Config;
use crate::models::{
    progress_key, ActionKind, CachedCourse, NotificationRecord, ProgressRecord, QueuedAction,
    UserDataRecord,
};
use crate::storage::error::StoreResult;
use crate::storage::schema::{init_schema, needs_init};

/// Persistent keyed collections with secondary indexes
///
/// Cheap to share behind an `Arc`; the connection lives behind an
/// interior mutex.
pub struct DurableStore {
    conn: Option<Mutex<Connection>>,
}

impl DurableStore {
    /// Open or create the database under the configured data directory
    ///
    /// Never fails: storage problems degrade the store to a disabled
    /// no-op backend and are logged.
    pub fn open(config: &Config) -> Self {
        match Self::try_open(&config.sqlite_path()) {
            Ok(conn) => Self {
                conn: Some(Mutex::new(conn)),
            },
            Err(e) => {
                warn!("persistent storage unavailable, continuing without persistence: {e}");
                Self { conn: None }
            }
        }
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
        })
    }

    /// A store with no backing storage: reads are empty, writes are
    /// accepted and dropped
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Whether a real database backs this store
    pub fn is_persistent(&self) -> bool {
        self.conn.is_some()
    }

    fn try_open(path: &Path) -> StoreResult<Connection> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(conn)
    }

    /// Run an operation against the connection, converting any failure
    /// into the given default
    fn with_conn<T>(&self, op: &str, default: T, f: impl FnOnce(&Connection) -> StoreResult<T>) -> T {
        let Some(ref mutex) = self.conn else {
            return default;
        };
        let conn = mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match f(&conn) {
            Ok(value) => value,
            Err(e) => {
                warn!("store operation {op} failed: {e}");
                default
            }
        }
    }

    // ==================== Courses ====================

    /// Upsert a cached course by course_id
    pub fn put_course(&self, course: &CachedCourse) {
        self.with_conn("put_course", (), |conn| {
            let body = serde_json::to_string(course)?;
            conn.execute(
                r#"
                INSERT OR REPLACE INTO courses (course_id, title, version, downloaded_at, size, body)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    course.course_id,
                    course.title,
                    course.version,
                    course.downloaded_at.timestamp_millis(),
                    course.size as i64,
                    body,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_course(&self, course_id: &str) -> Option<CachedCourse> {
        self.with_conn("get_course", None, |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM courses WHERE course_id = ?",
                    params![course_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(match body {
                Some(b) => Some(serde_json::from_str(&b)?),
                None => None,
            })
        })
    }

    pub fn delete_course(&self, course_id: &str) {
        self.with_conn("delete_course", (), |conn| {
            conn.execute("DELETE FROM courses WHERE course_id = ?", params![course_id])?;
            Ok(())
        })
    }

    /// All cached courses, most recently downloaded first
    pub fn all_courses(&self) -> Vec<CachedCourse> {
        self.with_conn("all_courses", Vec::new(), |conn| {
            let mut stmt =
                conn.prepare("SELECT body FROM courses ORDER BY downloaded_at DESC")?;
            collect_bodies(&mut stmt, [])
        })
    }

    pub fn course_count(&self) -> i64 {
        self.with_conn("course_count", 0, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?)
        })
    }

    /// Sum of bytes stored across all cached courses
    pub fn total_course_bytes(&self) -> u64 {
        self.with_conn("total_course_bytes", 0, |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(size), 0) FROM courses",
                [],
                |row| row.get(0),
            )?;
            Ok(total.max(0) as u64)
        })
    }

    // ==================== Progress ====================

    /// Upsert a progress record by (course_id, user_id)
    pub fn put_progress(&self, record: &ProgressRecord) {
        self.with_conn("put_progress", (), |conn| {
            let body = serde_json::to_string(record)?;
            conn.execute(
                r#"
                INSERT OR REPLACE INTO progress (key, course_id, user_id, is_pending, last_update, body)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    record.key(),
                    record.course_id,
                    record.user_id,
                    record.is_pending as i32,
                    record.last_update.timestamp_millis(),
                    body,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_progress(&self, course_id: &str, user_id: &str) -> Option<ProgressRecord> {
        self.with_conn("get_progress", None, |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM progress WHERE key = ?",
                    params![progress_key(course_id, user_id)],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(match body {
                Some(b) => Some(serde_json::from_str(&b)?),
                None => None,
            })
        })
    }

    /// All records still awaiting remote confirmation, oldest first
    pub fn pending_progress(&self) -> Vec<ProgressRecord> {
        self.with_conn("pending_progress", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM progress WHERE is_pending = 1 ORDER BY last_update ASC",
            )?;
            collect_bodies(&mut stmt, [])
        })
    }

    pub fn progress_for_user(&self, user_id: &str) -> Vec<ProgressRecord> {
        self.with_conn("progress_for_user", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM progress WHERE user_id = ? ORDER BY last_update DESC",
            )?;
            collect_bodies(&mut stmt, params![user_id])
        })
    }

    pub fn progress_for_course(&self, course_id: &str) -> Vec<ProgressRecord> {
        self.with_conn("progress_for_course", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM progress WHERE course_id = ? ORDER BY last_update DESC",
            )?;
            collect_bodies(&mut stmt, params![course_id])
        })
    }

    pub fn delete_progress(&self, course_id: &str, user_id: &str) {
        self.with_conn("delete_progress", (), |conn| {
            conn.execute(
                "DELETE FROM progress WHERE key = ?",
                params![progress_key(course_id, user_id)],
            )?;
            Ok(())
        })
    }

    // ==================== Offline actions ====================

    /// Upsert a queued action by id
    pub fn put_action(&self, action: &QueuedAction) {
        self.with_conn("put_action", (), |conn| {
            let body = serde_json::to_string(action)?;
            conn.execute(
                r#"
                INSERT OR REPLACE INTO offline_actions (id, kind, timestamp, retry_count, dead, body)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    action.id,
                    action.kind.as_str(),
                    action.timestamp,
                    action.retry_count,
                    action.dead as i32,
                    body,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_action(&self, id: &str) -> Option<QueuedAction> {
        self.with_conn("get_action", None, |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM offline_actions WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(match body {
                Some(b) => Some(serde_json::from_str(&b)?),
                None => None,
            })
        })
    }

    /// Actions awaiting replay, FIFO by enqueue timestamp
    ///
    /// Dead-lettered actions are excluded.
    pub fn live_actions(&self) -> Vec<QueuedAction> {
        self.with_conn("live_actions", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM offline_actions WHERE dead = 0 ORDER BY timestamp ASC, id ASC",
            )?;
            collect_bodies(&mut stmt, [])
        })
    }

    /// Dead-lettered actions, oldest first
    pub fn dead_actions(&self) -> Vec<QueuedAction> {
        self.with_conn("dead_actions", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM offline_actions WHERE dead = 1 ORDER BY timestamp ASC, id ASC",
            )?;
            collect_bodies(&mut stmt, [])
        })
    }

    pub fn actions_by_kind(&self, kind: ActionKind) -> Vec<QueuedAction> {
        self.with_conn("actions_by_kind", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM offline_actions WHERE kind = ? ORDER BY timestamp ASC, id ASC",
            )?;
            collect_bodies(&mut stmt, params![kind.as_str()])
        })
    }

    pub fn delete_action(&self, id: &str) {
        self.with_conn("delete_action", (), |conn| {
            conn.execute("DELETE FROM offline_actions WHERE id = ?", params![id])?;
            Ok(())
        })
    }

    /// Highest enqueue timestamp seen so far, across live and dead
    /// actions
    pub fn max_action_timestamp(&self) -> Option<i64> {
        self.with_conn("max_action_timestamp", None, |conn| {
            let max: Option<i64> = conn.query_row(
                "SELECT MAX(timestamp) FROM offline_actions",
                [],
                |row| row.get(0),
            )?;
            Ok(max)
        })
    }

    // ==================== User data ====================

    pub fn put_user_data(&self, record: &UserDataRecord) {
        self.with_conn("put_user_data", (), |conn| {
            let body = serde_json::to_string(record)?;
            conn.execute(
                "INSERT OR REPLACE INTO user_data (user_id, last_sync, body) VALUES (?, ?, ?)",
                params![record.user_id, record.last_sync.timestamp_millis(), body],
            )?;
            Ok(())
        })
    }

    pub fn get_user_data(&self, user_id: &str) -> Option<UserDataRecord> {
        self.with_conn("get_user_data", None, |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM user_data WHERE user_id = ?",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(match body {
                Some(b) => Some(serde_json::from_str(&b)?),
                None => None,
            })
        })
    }

    // ==================== Notifications ====================

    pub fn put_notification(&self, record: &NotificationRecord) {
        self.with_conn("put_notification", (), |conn| {
            let body = serde_json::to_string(record)?;
            conn.execute(
                r#"
                INSERT OR REPLACE INTO notifications (id, timestamp, is_read, body)
                VALUES (?, ?, ?, ?)
                "#,
                params![
                    record.id,
                    record.timestamp.timestamp_millis(),
                    record.is_read as i32,
                    body,
                ],
            )?;
            Ok(())
        })
    }

    /// Unread notifications, newest first
    pub fn unread_notifications(&self) -> Vec<NotificationRecord> {
        self.with_conn("unread_notifications", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM notifications WHERE is_read = 0 ORDER BY timestamp DESC",
            )?;
            collect_bodies(&mut stmt, [])
        })
    }

    /// Most recent notifications regardless of read state
    pub fn recent_notifications(&self, limit: u32) -> Vec<NotificationRecord> {
        self.with_conn("recent_notifications", Vec::new(), |conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM notifications ORDER BY timestamp DESC LIMIT ?")?;
            collect_bodies(&mut stmt, params![limit])
        })
    }

    pub fn mark_notification_read(&self, id: &str) {
        self.with_conn("mark_notification_read", (), |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM notifications WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(body) = body else {
                return Ok(());
            };
            let mut record: NotificationRecord = serde_json::from_str(&body)?;
            record.is_read = true;
            let body = serde_json::to_string(&record)?;
            conn.execute(
                "UPDATE notifications SET is_read = 1, body = ? WHERE id = ?",
                params![body, id],
            )?;
            Ok(())
        })
    }

    // ==================== Maintenance ====================

    /// Wipe every collection (used on logout/reset)
    pub fn clear(&self) {
        self.with_conn("clear", (), |conn| {
            conn.execute("DELETE FROM courses", [])?;
            conn.execute("DELETE FROM progress", [])?;
            conn.execute("DELETE FROM offline_actions", [])?;
            conn.execute("DELETE FROM user_data", [])?;
            conn.execute("DELETE FROM notifications", [])?;
            Ok(())
        })
    }
}

/// Collect and decode the JSON `body` column from a prepared query
fn collect_bodies<T: serde::de::DeserializeOwned, P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> StoreResult<Vec<T>> {
    let bodies = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut records = Vec::with_capacity(bodies.len());
    for body in bodies {
        records.push(serde_json::from_str(&body)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Asset, AssetKind, NewAction};
    use chrono::Utc;

    fn test_course(id: &str) -> CachedCourse {
        CachedCourse {
            course_id: id.to_string(),
            title: format!("Course {}", id),
            version: "1".to_string(),
            lessons: Vec::new(),
            quizzes: Vec::new(),
            assets: vec![Asset {
                id: "a1".to_string(),
                kind: AssetKind::Video,
                url: "https://cdn.test/a1.mp4".to_string(),
                size: 1024,
                downloaded: true,
            }],
            downloaded_at: Utc::now(),
            size: 1024,
        }
    }

    fn test_action(kind: ActionKind, timestamp: i64) -> QueuedAction {
        QueuedAction {
            id: format!("{}-{}-abcd1234", kind.as_str(), timestamp),
            kind,
            url: "https://api.test/things".to_string(),
            method: "POST".to_string(),
            headers: Vec::new(),
            body: None,
            timestamp,
            retry_count: 0,
            last_attempt_at: None,
            dead: false,
        }
    }

    #[test]
    fn test_course_round_trip() {
        let store = DurableStore::open_in_memory().unwrap();
        let course = test_course("c1");

        store.put_course(&course);
        let loaded = store.get_course("c1").unwrap();
        assert_eq!(loaded, course);

        assert!(store.get_course("missing").is_none());
    }

    #[test]
    fn test_put_is_idempotent() {
        let store = DurableStore::open_in_memory().unwrap();
        let course = test_course("c1");

        store.put_course(&course);
        store.put_course(&course);

        assert_eq!(store.course_count(), 1);
        assert_eq!(store.get_course("c1").unwrap(), course);
    }

    #[test]
    fn test_put_overwrites_on_refresh() {
        let store = DurableStore::open_in_memory().unwrap();
        let mut course = test_course("c1");
        store.put_course(&course);

        course.version = "2".to_string();
        store.put_course(&course);

        assert_eq!(store.course_count(), 1);
        assert_eq!(store.get_course("c1").unwrap().version, "2");
    }

    #[test]
    fn test_delete_course() {
        let store = DurableStore::open_in_memory().unwrap();
        store.put_course(&test_course("c1"));
        store.delete_course("c1");
        assert!(store.get_course("c1").is_none());
        assert_eq!(store.course_count(), 0);
    }

    #[test]
    fn test_total_course_bytes() {
        let store = DurableStore::open_in_memory().unwrap();
        let mut c1 = test_course("c1");
        c1.size = 100;
        let mut c2 = test_course("c2");
        c2.size = 250;
        store.put_course(&c1);
        store.put_course(&c2);

        assert_eq!(store.total_course_bytes(), 350);
    }

    #[test]
    fn test_progress_unique_per_course_and_user() {
        let store = DurableStore::open_in_memory().unwrap();

        let mut record = ProgressRecord::new("c1", "u1");
        record.percent = 40.0;
        store.put_progress(&record);

        record.percent = 70.0;
        store.put_progress(&record);

        let loaded = store.get_progress("c1", "u1").unwrap();
        assert_eq!(loaded.percent, 70.0);

        // Different user for the same course is a separate record
        store.put_progress(&ProgressRecord::new("c1", "u2"));
        assert_eq!(store.progress_for_course("c1").len(), 2);
        assert_eq!(store.progress_for_user("u1").len(), 1);
    }

    #[test]
    fn test_pending_progress_filter() {
        let store = DurableStore::open_in_memory().unwrap();

        let pending = ProgressRecord::new("c1", "u1");
        let mut synced = ProgressRecord::new("c2", "u1");
        synced.is_pending = false;
        store.put_progress(&pending);
        store.put_progress(&synced);

        let listed = store.pending_progress();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].course_id, "c1");
    }

    #[test]
    fn test_actions_fifo_order() {
        let store = DurableStore::open_in_memory().unwrap();

        store.put_action(&test_action(ActionKind::Progress, 300));
        store.put_action(&test_action(ActionKind::Enrollment, 100));
        store.put_action(&test_action(ActionKind::Review, 200));

        let drained = store.live_actions();
        let timestamps: Vec<i64> = drained.iter().map(|a| a.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn test_dead_actions_excluded_from_live() {
        let store = DurableStore::open_in_memory().unwrap();

        let mut action = test_action(ActionKind::Payment, 100);
        store.put_action(&action);
        assert_eq!(store.live_actions().len(), 1);

        action.dead = true;
        store.put_action(&action);

        assert!(store.live_actions().is_empty());
        assert_eq!(store.dead_actions().len(), 1);
    }

    #[test]
    fn test_actions_by_kind() {
        let store = DurableStore::open_in_memory().unwrap();
        store.put_action(&test_action(ActionKind::Enrollment, 100));
        store.put_action(&test_action(ActionKind::Review, 200));

        let enrollments = store.actions_by_kind(ActionKind::Enrollment);
        assert_eq!(enrollments.len(), 1);
        assert_eq!(enrollments[0].kind, ActionKind::Enrollment);
    }

    #[test]
    fn test_max_action_timestamp() {
        let store = DurableStore::open_in_memory().unwrap();
        assert_eq!(store.max_action_timestamp(), None);

        store.put_action(&test_action(ActionKind::Progress, 500));
        store.put_action(&test_action(ActionKind::Progress, 300));
        assert_eq!(store.max_action_timestamp(), Some(500));
    }

    #[test]
    fn test_user_data_round_trip() {
        let store = DurableStore::open_in_memory().unwrap();
        let record = UserDataRecord {
            user_id: "u1".to_string(),
            profile: serde_json::json!({"name": "Dana"}),
            preferences: serde_json::json!({"theme": "dark"}),
            last_sync: Utc::now(),
        };

        store.put_user_data(&record);
        assert_eq!(store.get_user_data("u1").unwrap(), record);
    }

    #[test]
    fn test_notifications_mailbox() {
        let store = DurableStore::open_in_memory().unwrap();
        let first = NotificationRecord::new("Welcome", "Hello", serde_json::json!({}));
        let second = NotificationRecord::new("Reminder", "Lesson 2 awaits", serde_json::json!({}));
        store.put_notification(&first);
        store.put_notification(&second);

        assert_eq!(store.unread_notifications().len(), 2);

        store.mark_notification_read(&first.id);
        let unread = store.unread_notifications();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);

        assert_eq!(store.recent_notifications(10).len(), 2);
        assert_eq!(store.recent_notifications(1).len(), 1);
    }

    #[test]
    fn test_clear_wipes_everything() {
        let store = DurableStore::open_in_memory().unwrap();
        store.put_course(&test_course("c1"));
        store.put_progress(&ProgressRecord::new("c1", "u1"));
        store.put_action(&test_action(ActionKind::Enrollment, 100));
        store.put_notification(&NotificationRecord::new("t", "b", serde_json::json!({})));

        store.clear();

        assert_eq!(store.course_count(), 0);
        assert!(store.pending_progress().is_empty());
        assert!(store.live_actions().is_empty());
        assert!(store.unread_notifications().is_empty());
    }

    #[test]
    fn test_disabled_store_is_safe() {
        let store = DurableStore::disabled();
        assert!(!store.is_persistent());

        // Writes succeed without persisting
        store.put_course(&test_course("c1"));
        store.put_progress(&ProgressRecord::new("c1", "u1"));
        store.put_action(&test_action(ActionKind::Progress, 100));

        // Reads return empty
        assert!(store.get_course("c1").is_none());
        assert!(store.pending_progress().is_empty());
        assert!(store.live_actions().is_empty());
        assert_eq!(store.course_count(), 0);
    }

    #[test]
    fn test_open_persists_across_reopens() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        {
            let store = DurableStore::open(&config);
            assert!(store.is_persistent());
            store.put_course(&test_course("c1"));
        }

        let store = DurableStore::open(&config);
        assert!(store.get_course("c1").is_some());
    }
}
