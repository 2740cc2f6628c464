//! Local learning-progress tracking
//!
//! Progress is written locally first and pushed to the remote system
//! by the sync scheduler. Each save replaces the prior snapshot
//! wholesale (last-write-wins by `last_update`); completed-lesson sets
//! are never merged across writes.

use std::sync::Arc;

use chrono::Utc;

use crate::models::ProgressRecord;
use crate::storage::DurableStore;

/// A local progress write
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub course_id: String,
    pub user_id: String,
    pub percent: f32,
    pub completed_lessons: Vec<String>,
    pub last_position: Option<String>,
}

impl ProgressUpdate {
    pub fn new(course_id: impl Into<String>, user_id: impl Into<String>, percent: f32) -> Self {
        Self {
            course_id: course_id.into(),
            user_id: user_id.into(),
            percent,
            completed_lessons: Vec::new(),
            last_position: None,
        }
    }

    pub fn with_lessons(mut self, lessons: Vec<String>) -> Self {
        self.completed_lessons = lessons;
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.last_position = Some(position.into());
        self
    }
}

/// Records per-user, per-course progress with a pending flag
pub struct ProgressTracker {
    store: Arc<DurableStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<DurableStore>) -> Self {
        Self { store }
    }

    /// Persist a local progress snapshot
    ///
    /// Upserts by (course_id, user_id), marks the record pending, and
    /// stamps `last_update`. Returns the stored record.
    pub fn save_local(&self, update: ProgressUpdate) -> ProgressRecord {
        let record = ProgressRecord {
            course_id: update.course_id,
            user_id: update.user_id,
            percent: update.percent.clamp(0.0, 100.0),
            completed_lessons: update.completed_lessons,
            last_position: update.last_position,
            last_update: Utc::now(),
            is_pending: true,
        };
        self.store.put_progress(&record);
        record
    }

    /// All records not yet confirmed by the remote system
    pub fn list_pending(&self) -> Vec<ProgressRecord> {
        self.store.pending_progress()
    }

    /// Clear the pending flag after the remote system confirmed the
    /// record
    pub fn confirm_synced(&self, course_id: &str, user_id: &str) {
        if let Some(mut record) = self.store.get_progress(course_id, user_id) {
            record.is_pending = false;
            self.store.put_progress(&record);
        }
    }

    pub fn get(&self, course_id: &str, user_id: &str) -> Option<ProgressRecord> {
        self.store.get_progress(course_id, user_id)
    }

    /// All progress for one learner, most recently updated first
    pub fn for_user(&self, user_id: &str) -> Vec<ProgressRecord> {
        self.store.progress_for_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Arc::new(DurableStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_save_local_marks_pending() {
        let tracker = tracker();
        let record = tracker.save_local(ProgressUpdate::new("c1", "u1", 40.0));

        assert!(record.is_pending);
        assert_eq!(record.percent, 40.0);
        assert_eq!(tracker.list_pending().len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let tracker = tracker();

        tracker.save_local(ProgressUpdate::new("c1", "u1", 40.0));
        tracker.save_local(ProgressUpdate::new("c1", "u1", 70.0));

        let record = tracker.get("c1", "u1").unwrap();
        assert_eq!(record.percent, 70.0);
        assert!(record.is_pending);

        // Still one record for the pair
        assert_eq!(tracker.list_pending().len(), 1);
    }

    #[test]
    fn test_snapshots_replace_wholesale() {
        let tracker = tracker();

        tracker.save_local(
            ProgressUpdate::new("c1", "u1", 30.0)
                .with_lessons(vec!["l1".to_string(), "l2".to_string()]),
        );
        tracker.save_local(
            ProgressUpdate::new("c1", "u1", 35.0).with_lessons(vec!["l3".to_string()]),
        );

        // No merging of completed lessons across writes
        let record = tracker.get("c1", "u1").unwrap();
        assert_eq!(record.completed_lessons, vec!["l3"]);
    }

    #[test]
    fn test_confirm_synced_clears_pending() {
        let tracker = tracker();
        tracker.save_local(ProgressUpdate::new("c1", "u1", 40.0));

        tracker.confirm_synced("c1", "u1");

        let record = tracker.get("c1", "u1").unwrap();
        assert!(!record.is_pending);
        assert!(tracker.list_pending().is_empty());

        // Confirming an unknown pair is a no-op
        tracker.confirm_synced("c9", "u9");
    }

    #[test]
    fn test_pending_until_confirmed() {
        let tracker = tracker();
        tracker.save_local(ProgressUpdate::new("c1", "u1", 40.0));
        tracker.save_local(ProgressUpdate::new("c1", "u1", 70.0));

        let record = tracker.get("c1", "u1").unwrap();
        assert_eq!(record.percent, 70.0);
        assert!(record.is_pending);

        tracker.confirm_synced("c1", "u1");
        assert!(!tracker.get("c1", "u1").unwrap().is_pending);
    }

    #[test]
    fn test_percent_clamped() {
        let tracker = tracker();
        let record = tracker.save_local(ProgressUpdate::new("c1", "u1", 140.0));
        assert_eq!(record.percent, 100.0);
    }

    #[test]
    fn test_for_user_lists_all_courses() {
        let tracker = tracker();
        tracker.save_local(ProgressUpdate::new("c1", "u1", 10.0));
        tracker.save_local(ProgressUpdate::new("c2", "u1", 20.0));
        tracker.save_local(ProgressUpdate::new("c1", "u2", 30.0));

        assert_eq!(tracker.for_user("u1").len(), 2);
        assert_eq!(tracker.for_user("u2").len(), 1);
    }

    #[test]
    fn test_disabled_store_returns_empty() {
        let tracker = ProgressTracker::new(Arc::new(DurableStore::disabled()));

        // Saving succeeds without persisting
        let record = tracker.save_local(ProgressUpdate::new("c1", "u1", 40.0));
        assert!(record.is_pending);

        assert!(tracker.get("c1", "u1").is_none());
        assert!(tracker.list_pending().is_empty());
    }
}
