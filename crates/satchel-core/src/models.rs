//! Data models for Satchel
//!
//! Defines the records persisted by the durable store and the transient
//! progress/result types exchanged with the sync scheduler and the
//! download manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a downloadable course asset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Document,
}

/// A single downloadable asset belonging to a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    /// Unique identifier within the course
    pub id: String,
    pub kind: AssetKind,
    /// Where the asset can be fetched from
    pub url: String,
    /// Declared size in bytes (from the manifest)
    pub size: u64,
    /// Whether the bytes have been fetched and stored locally.
    /// A course with some assets not downloaded is a valid state,
    /// not an error. Manifests omit this field.
    #[serde(default)]
    pub downloaded: bool,
}

/// A lesson entry in a course outline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub id: String,
    pub title: String,
}

/// A quiz entry in a course outline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: String,
    pub title: String,
}

/// A course cached locally for offline use
///
/// Written once per successful download and overwritten on refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedCourse {
    /// Unique course identifier
    pub course_id: String,
    pub title: String,
    /// Content version reported by the manifest
    pub version: String,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
    pub assets: Vec<Asset>,
    /// When the download completed
    pub downloaded_at: DateTime<Utc>,
    /// Bytes actually stored on disk
    pub size: u64,
}

impl CachedCourse {
    /// Assets that still need to be fetched
    pub fn missing_assets(&self) -> Vec<&Asset> {
        self.assets.iter().filter(|a| !a.downloaded).collect()
    }

    /// True when every asset fetched successfully
    pub fn is_complete(&self) -> bool {
        self.assets.iter().all(|a| a.downloaded)
    }
}

/// Per-user, per-course learning progress
///
/// One record per (course_id, user_id). Each local save replaces the
/// prior snapshot wholesale; last-write-wins by `last_update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    pub course_id: String,
    pub user_id: String,
    /// Completion percentage, 0-100
    pub percent: f32,
    pub completed_lessons: Vec<String>,
    /// Playback/scroll position within the last lesson, if any
    pub last_position: Option<String>,
    pub last_update: DateTime<Utc>,
    /// True until the remote system confirms acceptance
    pub is_pending: bool,
}

impl ProgressRecord {
    pub fn new(course_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            user_id: user_id.into(),
            percent: 0.0,
            completed_lessons: Vec::new(),
            last_position: None,
            last_update: Utc::now(),
            is_pending: true,
        }
    }

    /// Composite storage key
    pub fn key(&self) -> String {
        progress_key(&self.course_id, &self.user_id)
    }
}

/// Build the composite key for a progress record
pub fn progress_key(course_id: &str, user_id: &str) -> String {
    format!("{}:{}", course_id, user_id)
}

/// The kind of mutating operation recorded for later replay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Enrollment,
    Progress,
    Review,
    Payment,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Enrollment => "enrollment",
            ActionKind::Progress => "progress",
            ActionKind::Review => "review",
            ActionKind::Payment => "payment",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mutating request recorded while offline, awaiting replay
///
/// Append-only until replayed; ordered by `timestamp`, which is
/// monotonically non-decreasing in enqueue order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedAction {
    /// Generated id: kind, timestamp, and a random suffix
    pub id: String,
    pub kind: ActionKind,
    /// Target URL, replayed verbatim
    pub url: String,
    /// HTTP method, replayed verbatim
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Enqueue time, unix milliseconds
    pub timestamp: i64,
    pub retry_count: u32,
    /// Last failed replay attempt, unix milliseconds
    pub last_attempt_at: Option<i64>,
    /// Dead-lettered: exhausted retries or permanently rejected
    pub dead: bool,
}

/// Input for [`QueuedAction`] creation; the queue assigns id,
/// timestamp, and retry bookkeeping.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub kind: ActionKind,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl NewAction {
    pub fn new(kind: ActionKind, url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            method: method.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Cached snapshot of a remote user profile for offline reads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDataRecord {
    pub user_id: String,
    pub profile: serde_json::Value,
    pub preferences: serde_json::Value,
    pub last_sync: DateTime<Utc>,
}

/// A locally stored notification (a mailbox, not a delivery channel)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl NotificationRecord {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            payload,
            timestamp: Utc::now(),
            is_read: false,
        }
    }
}

/// Download lifecycle for one course
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadStatus {
    NotStarted,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl DownloadStatus {
    /// Finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DownloadStatus::Downloading)
    }
}

/// Transient download progress for one course
///
/// Not persisted; a restarted process re-derives per-asset state from
/// the cached course record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadProgress {
    pub course_id: String,
    pub total_size: u64,
    pub downloaded_size: u64,
    /// Always within [0, 100]
    pub percentage: f32,
    pub status: DownloadStatus,
    pub error: Option<String>,
}

impl DownloadProgress {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            total_size: 0,
            downloaded_size: 0,
            percentage: 0.0,
            status: DownloadStatus::NotStarted,
            error: None,
        }
    }

    /// Update `downloaded_size` and recompute the clamped percentage
    pub fn set_downloaded(&mut self, downloaded: u64) {
        self.downloaded_size = downloaded;
        self.percentage = percentage(downloaded, self.total_size);
    }
}

/// Clamped percentage of `done` over `total`
pub fn percentage(done: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
}

/// Aggregate outcome of one sync pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncResult {
    /// True when no item failed
    pub success: bool,
    pub synced_items: u32,
    pub failed_items: u32,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn record_success(&mut self) {
        self.synced_items += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed_items += 1;
        self.errors.push(error.into());
    }

    /// Finalize the success flag once a pass completes
    pub fn finish(mut self) -> Self {
        self.success = self.failed_items == 0;
        self
    }
}
