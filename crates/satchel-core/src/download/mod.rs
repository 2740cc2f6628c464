//! Course content downloads
//!
//! Fetches course manifests and assets for offline use. Downloads are
//! sequential per course, pause at asset boundaries, and degrade
//! gracefully: a failed asset is recorded and skipped, not fatal to
//! the course.

pub mod manager;
pub mod manifest;

use thiserror::Error;

pub use manager::{usage_report, DownloadManager, StorageUsage};
pub use manifest::{CourseManifest, CourseSource, HttpCourseSource};

/// Errors surfaced by the download manager
///
/// Per-asset fetch failures are not errors; they are recorded on the
/// asset and aggregated into the course's download progress.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The course manifest could not be fetched or decoded
    #[error("failed to fetch manifest for course {course_id}: {reason}")]
    Manifest { course_id: String, reason: String },

    /// An asset fetch failed
    #[error("failed to fetch asset {asset_id}: {reason}")]
    Asset { asset_id: String, reason: String },

    /// A download for this course is already running
    #[error("download already active for course {0}")]
    AlreadyActive(String),

    /// No cached course to resume or delete
    #[error("course {0} is not cached")]
    NotCached(String),

    /// Local file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
