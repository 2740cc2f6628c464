//! Offline action queue
//!
//! Records mutating operations (enrollment, progress, review, payment)
//! attempted while offline so the sync scheduler can replay them in
//! order. Actions are persisted through the durable store and stay
//! queued until a replay is confirmed.
//!
//! Retry policy: capped exponential backoff. An action that failed is
//! skipped by sync passes until `2s * 2^retry_count` (capped at five
//! minutes) has elapsed since the last attempt. After [`MAX_RETRIES`]
//! failed attempts, or on a permanent rejection, the action is
//! dead-lettered: kept in the store, excluded from `drain`, listable
//! via `dead_letters` and re-queueable via `retry_dead`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::models::{NewAction, QueuedAction};
use crate::storage::DurableStore;

/// Delay before the first replay retry
const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Upper bound on the per-action retry delay
const BACKOFF_CAP: Duration = Duration::from_secs(300);

/// Failed attempts before an action is dead-lettered
pub const MAX_RETRIES: u32 = 8;

/// Retry delay for an action that has already failed `retry_count`
/// times
pub fn backoff_delay(retry_count: u32) -> Duration {
    let millis = (BACKOFF_BASE.as_millis() as u64) << retry_count.min(16);
    Duration::from_millis(millis).min(BACKOFF_CAP)
}

/// Whether the action's backoff window has elapsed at `now_millis`
pub fn is_due(action: &QueuedAction, now_millis: i64) -> bool {
    match action.last_attempt_at {
        None => true,
        Some(last) => now_millis >= last + backoff_delay(action.retry_count).as_millis() as i64,
    }
}

/// Ordered, persistent queue of mutating actions awaiting replay
pub struct ActionQueue {
    store: Arc<DurableStore>,
    /// Signals the sync scheduler that work is pending
    wakeup: Arc<Notify>,
    /// Highest timestamp handed out so far; enqueue order is strictly
    /// increasing even when the clock stalls within a millisecond
    last_timestamp: AtomicI64,
}

impl ActionQueue {
    pub fn new(store: Arc<DurableStore>) -> Self {
        let last = store.max_action_timestamp().unwrap_or(0);
        Self {
            store,
            wakeup: Arc::new(Notify::new()),
            last_timestamp: AtomicI64::new(last),
        }
    }

    /// Notifier the scheduler waits on; fired on every enqueue
    pub fn wakeup(&self) -> Arc<Notify> {
        self.wakeup.clone()
    }

    /// Record a mutating action for later replay
    ///
    /// Assigns an id derived from the kind, timestamp, and a random
    /// suffix, persists the action, and signals the scheduler.
    pub fn enqueue(&self, new: NewAction) -> QueuedAction {
        let now = Utc::now().timestamp_millis();
        let timestamp = self.next_timestamp(now);
        let suffix = &Uuid::new_v4().to_string()[..8];

        let action = QueuedAction {
            id: format!("{}-{}-{}", new.kind.as_str(), timestamp, suffix),
            kind: new.kind,
            url: new.url,
            method: new.method,
            headers: new.headers,
            body: new.body,
            timestamp,
            retry_count: 0,
            last_attempt_at: None,
            dead: false,
        };

        self.store.put_action(&action);
        self.wakeup.notify_one();
        action
    }

    /// All queued actions in FIFO order by enqueue timestamp
    ///
    /// Replay must preserve this order: actions may be causally
    /// dependent (an enrollment before a progress update for the same
    /// course). Dead-lettered actions are excluded.
    pub fn drain(&self) -> Vec<QueuedAction> {
        self.store.live_actions()
    }

    /// Remove an action after its replay was confirmed
    pub fn mark_done(&self, id: &str) {
        self.store.delete_action(id);
    }

    /// Record a failed replay attempt
    ///
    /// Bumps `retry_count` and stamps `last_attempt_at`; once the
    /// retry ceiling is reached the action is dead-lettered. Returns
    /// the updated action.
    pub fn increment_retry(&self, id: &str) -> Option<QueuedAction> {
        let mut action = self.store.get_action(id)?;
        action.retry_count += 1;
        action.last_attempt_at = Some(Utc::now().timestamp_millis());
        if action.retry_count >= MAX_RETRIES {
            action.dead = true;
        }
        self.store.put_action(&action);
        Some(action)
    }

    /// Dead-letter an action immediately (permanent rejection)
    pub fn mark_dead(&self, id: &str) {
        if let Some(mut action) = self.store.get_action(id) {
            action.dead = true;
            action.last_attempt_at = Some(Utc::now().timestamp_millis());
            self.store.put_action(&action);
        }
    }

    /// Dead-lettered actions, oldest first
    pub fn dead_letters(&self) -> Vec<QueuedAction> {
        self.store.dead_actions()
    }

    /// Put a dead-lettered action back in the queue with a fresh retry
    /// budget
    pub fn retry_dead(&self, id: &str) -> bool {
        let Some(mut action) = self.store.get_action(id) else {
            return false;
        };
        if !action.dead {
            return false;
        }
        action.dead = false;
        action.retry_count = 0;
        action.last_attempt_at = None;
        self.store.put_action(&action);
        self.wakeup.notify_one();
        true
    }

    /// Number of actions awaiting replay
    pub fn len(&self) -> usize {
        self.drain().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_timestamp(&self, now: i64) -> i64 {
        // max(now, last + 1): non-decreasing across restarts, strictly
        // increasing within a process so FIFO order survives same-
        // millisecond enqueues
        match self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now - 1) + 1)
            }) {
            Ok(prev) => prev.max(now - 1) + 1,
            Err(_) => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionKind;

    fn queue() -> ActionQueue {
        ActionQueue::new(Arc::new(DurableStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_enqueue_assigns_id_and_timestamp() {
        let queue = queue();
        let action = queue.enqueue(NewAction::new(
            ActionKind::Enrollment,
            "https://api.test/enroll",
            "POST",
        ));

        assert!(action.id.starts_with("enrollment-"));
        assert_eq!(action.retry_count, 0);
        assert!(!action.dead);
        assert!(action.timestamp > 0);
    }

    #[test]
    fn test_drain_is_fifo() {
        let queue = queue();
        let a1 = queue.enqueue(NewAction::new(ActionKind::Enrollment, "u1", "POST"));
        let a2 = queue.enqueue(NewAction::new(ActionKind::Progress, "u2", "PUT"));
        let a3 = queue.enqueue(NewAction::new(ActionKind::Review, "u3", "POST"));

        // Timestamps are monotonically increasing in enqueue order
        assert!(a1.timestamp < a2.timestamp);
        assert!(a2.timestamp < a3.timestamp);

        let drained = queue.drain();
        let ids: Vec<&str> = drained.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![a1.id.as_str(), a2.id.as_str(), a3.id.as_str()]);
    }

    #[test]
    fn test_mark_done_removes_action() {
        let queue = queue();
        let a1 = queue.enqueue(NewAction::new(ActionKind::Enrollment, "u1", "POST"));
        let a2 = queue.enqueue(NewAction::new(ActionKind::Review, "u2", "POST"));

        queue.mark_done(&a1.id);

        let remaining = queue.drain();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, a2.id);
    }

    #[test]
    fn test_increment_retry() {
        let queue = queue();
        let action = queue.enqueue(NewAction::new(ActionKind::Payment, "u1", "POST"));

        let updated = queue.increment_retry(&action.id).unwrap();
        assert_eq!(updated.retry_count, 1);
        assert!(updated.last_attempt_at.is_some());
        assert!(!updated.dead);
    }

    #[test]
    fn test_retry_ceiling_dead_letters() {
        let queue = queue();
        let action = queue.enqueue(NewAction::new(ActionKind::Review, "u1", "POST"));

        for _ in 0..MAX_RETRIES {
            queue.increment_retry(&action.id);
        }

        assert!(queue.drain().is_empty());
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].retry_count, MAX_RETRIES);
        assert!(dead[0].dead);
    }

    #[test]
    fn test_mark_dead_immediately() {
        let queue = queue();
        let action = queue.enqueue(NewAction::new(ActionKind::Enrollment, "u1", "POST"));

        queue.mark_dead(&action.id);

        assert!(queue.drain().is_empty());
        assert_eq!(queue.dead_letters().len(), 1);
    }

    #[test]
    fn test_retry_dead_requeues() {
        let queue = queue();
        let action = queue.enqueue(NewAction::new(ActionKind::Enrollment, "u1", "POST"));
        queue.mark_dead(&action.id);

        assert!(queue.retry_dead(&action.id));

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].retry_count, 0);
        assert!(drained[0].last_attempt_at.is_none());

        // Not dead: no-op
        assert!(!queue.retry_dead(&action.id));
        // Unknown id: no-op
        assert!(!queue.retry_dead("missing"));
    }

    #[test]
    fn test_backoff_delay_curve() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(16));
        // Capped at five minutes
        assert_eq!(backoff_delay(10), Duration::from_secs(300));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_is_due_respects_backoff() {
        let queue = queue();
        let action = queue.enqueue(NewAction::new(ActionKind::Progress, "u1", "PUT"));

        // Fresh actions are always due
        assert!(is_due(&action, Utc::now().timestamp_millis()));

        let failed = queue.increment_retry(&action.id).unwrap();
        let last = failed.last_attempt_at.unwrap();

        // Inside the backoff window
        assert!(!is_due(&failed, last + 1_000));
        // After the window (retry_count 1 -> 4s)
        assert!(is_due(&failed, last + 4_000));
    }

    #[test]
    fn test_disabled_store_never_raises() {
        let queue = ActionQueue::new(Arc::new(DurableStore::disabled()));

        // Enqueue succeeds even though nothing persists
        let action = queue.enqueue(NewAction::new(ActionKind::Enrollment, "u1", "POST"));
        assert!(action.id.starts_with("enrollment-"));

        // Drain returns an empty sequence rather than failing
        assert!(queue.drain().is_empty());
        assert!(queue.is_empty());
    }
}
