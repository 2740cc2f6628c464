//! Satchel Core Library
//!
//! This crate provides the offline-first engine for Satchel, a
//! learning client that keeps working while disconnected and
//! reconciles with a remote system of record once connectivity
//! returns.
//!
//! # Architecture
//!
//! - **Durable store**: SQLite-backed keyed collections with secondary
//!   indexes; everything else writes through it
//! - **Action queue**: mutating operations recorded offline for
//!   ordered replay
//! - **Progress tracker**: per-user, per-course progress with a
//!   pending flag
//! - **Sync scheduler**: drains both queues against the remote API on
//!   connectivity, manual request, or a periodic tick
//! - **Download manager**: resumable, size-accounted course content
//!   downloads
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(DurableStore::open(&config));
//! let tracker = Arc::new(ProgressTracker::new(store.clone()));
//! let queue = Arc::new(ActionQueue::new(store.clone()));
//!
//! // Record work while offline
//! tracker.save_local(ProgressUpdate::new("course-1", "user-1", 40.0));
//! queue.enqueue(NewAction::new(ActionKind::Enrollment, url, "POST"));
//!
//! // Reconcile once connectivity returns
//! let result = scheduler.sync_now().await?;
//! ```
//!
//! # Modules
//!
//! - `storage`: durable store (main entry point for persistence)
//! - `models`: record types shared across components
//! - `queue`: offline action queue
//! - `progress`: local progress tracking
//! - `sync`: connectivity signal, remote client, sync scheduler
//! - `download`: course content download manager
//! - `config`: application configuration

pub mod config;
pub mod download;
pub mod models;
pub mod progress;
pub mod queue;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use download::{
    usage_report, CourseManifest, CourseSource, DownloadError, DownloadManager, HttpCourseSource,
    StorageUsage,
};
pub use models::{
    ActionKind, Asset, AssetKind, CachedCourse, DownloadProgress, DownloadStatus, Lesson,
    NewAction, NotificationRecord, ProgressRecord, QueuedAction, Quiz, SyncResult, UserDataRecord,
};
pub use progress::{ProgressTracker, ProgressUpdate};
pub use queue::ActionQueue;
pub use storage::{DurableStore, StoreError};
pub use sync::{
    connectivity_channel, ConnectivityHandle, ConnectivityMonitor, HttpRemoteClient, RemoteClient,
    RemoteError, SchedulerHandle, SyncError, SyncEvent, SyncPhase, SyncScheduler,
};
