//! Sync scheduler
//!
//! Drains locally written state against the remote system whenever
//! connectivity allows: pending progress records first, then the
//! action queue in FIFO order. A pass is triggered by a connectivity
//! online transition, a manual request, a periodic tick, or a queue
//! wakeup, and aggregates its outcome into a [`SyncResult`] instead of
//! surfacing per-item errors.
//!
//! Passes are single-flight: a `sync_now` call during an active pass
//! fails with [`SyncError::AlreadyRunning`] rather than stacking
//! passes. A pass is not preemptible mid-item; shutdown of the spawned
//! loop takes effect between passes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info};

use crate::models::SyncResult;
use crate::progress::ProgressTracker;
use crate::queue::{is_due, ActionQueue};
use crate::sync::connectivity::ConnectivityMonitor;
use crate::sync::remote::RemoteClient;

/// Scheduler state
///
/// `Error` is advisory: it reports that the last pass had failures and
/// does not block the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Error,
}

/// Events emitted while a pass runs
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Scheduler state changed
    PhaseChanged(SyncPhase),
    /// Fraction of the pass completed, for progress indicators
    Progress {
        completed: usize,
        total: usize,
        percent: f32,
    },
    /// A pass finished
    Completed(SyncResult),
}

/// Errors a manual sync request can fail with
///
/// Per-item failures never surface here; they are aggregated into the
/// pass result.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Connectivity is absent; the request fails fast instead of
    /// waiting
    #[error("cannot sync while offline")]
    Offline,

    /// Another pass is active
    #[error("a sync pass is already running")]
    AlreadyRunning,
}

/// Commands for the spawned scheduler loop
#[derive(Debug)]
pub enum SchedulerCommand {
    SyncNow,
    Shutdown,
}

/// Handle to control a spawned scheduler loop
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Request a pass from the running loop
    pub async fn sync_now(&self) {
        let _ = self.command_tx.send(SchedulerCommand::SyncNow).await;
    }

    /// Tear the loop down; takes effect between passes
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Shutdown).await;
    }
}

/// Observes connectivity and drains local state against the remote
/// system
pub struct SyncScheduler {
    tracker: Arc<ProgressTracker>,
    queue: Arc<ActionQueue>,
    remote: Arc<dyn RemoteClient>,
    connectivity: ConnectivityMonitor,
    phase: watch::Sender<SyncPhase>,
    phase_rx: watch::Receiver<SyncPhase>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SyncEvent>>,
    pass_lock: Mutex<()>,
}

impl SyncScheduler {
    pub fn new(
        tracker: Arc<ProgressTracker>,
        queue: Arc<ActionQueue>,
        remote: Arc<dyn RemoteClient>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let (phase, phase_rx) = watch::channel(SyncPhase::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            tracker,
            queue,
            remote,
            connectivity,
            phase,
            phase_rx,
            event_tx,
            event_rx: Some(event_rx),
            pass_lock: Mutex::new(()),
        }
    }

    /// Current scheduler state
    pub fn phase(&self) -> SyncPhase {
        *self.phase_rx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase_rx.clone()
    }

    /// Take the event receiver (can only be called once, before
    /// spawning)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Run one sync pass now
    ///
    /// Fails fast with [`SyncError::Offline`] when disconnected and
    /// with [`SyncError::AlreadyRunning`] when a pass is active.
    pub async fn sync_now(&self) -> Result<SyncResult, SyncError> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let _guard = self.pass_lock.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        Ok(self.run_pass().await)
    }

    /// One drain-and-replay cycle; caller holds the pass lock
    async fn run_pass(&self) -> SyncResult {
        self.set_phase(SyncPhase::Syncing);

        let pending = self.tracker.list_pending();
        let now = Utc::now().timestamp_millis();
        // Actions inside their backoff window stay queued for a later
        // pass
        let actions: Vec<_> = self
            .queue
            .drain()
            .into_iter()
            .filter(|a| is_due(a, now))
            .collect();

        let total = pending.len() + actions.len();
        let mut processed = 0usize;
        let mut result = SyncResult::default();

        // Phase one: pending progress records
        for record in pending {
            match self.remote.push_progress(&record).await {
                Ok(()) => {
                    self.tracker.confirm_synced(&record.course_id, &record.user_id);
                    result.record_success();
                }
                Err(e) => {
                    // Left pending; it will be retried next pass
                    result.record_failure(format!(
                        "progress {}/{}: {}",
                        record.course_id, record.user_id, e
                    ));
                }
            }
            processed += 1;
            self.emit_progress(processed, total);
        }

        // Phase two: the action queue, FIFO
        for action in actions {
            match self.remote.replay(&action).await {
                Ok(()) => {
                    self.queue.mark_done(&action.id);
                    result.record_success();
                }
                Err(e) if e.is_permanent() => {
                    self.queue.mark_dead(&action.id);
                    result.record_failure(format!("action {} dead-lettered: {}", action.id, e));
                }
                Err(e) => {
                    self.queue.increment_retry(&action.id);
                    result.record_failure(format!("action {}: {}", action.id, e));
                }
            }
            processed += 1;
            self.emit_progress(processed, total);
        }

        let result = result.finish();
        info!(
            "sync pass finished: {} synced, {} failed",
            result.synced_items, result.failed_items
        );

        self.set_phase(if result.success {
            SyncPhase::Idle
        } else {
            SyncPhase::Error
        });
        let _ = self.event_tx.send(SyncEvent::Completed(result.clone()));

        result
    }

    /// Spawn the long-lived scheduler loop
    ///
    /// The loop syncs on the periodic tick, on connectivity coming
    /// back, on queue wakeups, and on manual requests through the
    /// returned handle.
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        tokio::spawn(self.clone().run_loop(interval, command_rx));
        SchedulerHandle { command_tx }
    }

    async fn run_loop(
        self: Arc<Self>,
        interval: Duration,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
    ) {
        let mut online_rx = self.connectivity.subscribe();
        let wakeup = self.queue.wakeup();
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick completes immediately; consume it so
        // spawning does not trigger an instant pass
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.try_pass("periodic tick").await;
                }
                changed = online_rx.changed() => {
                    match changed {
                        Ok(()) => {
                            let online = *online_rx.borrow_and_update();
                            if online {
                                self.try_pass("connectivity restored").await;
                            }
                        }
                        Err(_) => break,
                    }
                }
                _ = wakeup.notified() => {
                    self.try_pass("queued work").await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::SyncNow) => {
                            self.try_pass("manual request").await;
                        }
                        Some(SchedulerCommand::Shutdown) | None => break,
                    }
                }
            }
        }
        debug!("scheduler loop stopped");
    }

    async fn try_pass(&self, trigger: &str) {
        match self.sync_now().await {
            Ok(result) => {
                debug!(
                    "sync ({trigger}): {} synced, {} failed",
                    result.synced_items, result.failed_items
                );
            }
            Err(e) => debug!("sync skipped ({trigger}): {e}"),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        let _ = self.phase.send(phase);
        let _ = self.event_tx.send(SyncEvent::PhaseChanged(phase));
    }

    fn emit_progress(&self, completed: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            (completed as f32 / total as f32) * 100.0
        };
        let _ = self.event_tx.send(SyncEvent::Progress {
            completed,
            total,
            percent,
        });
    }
}
