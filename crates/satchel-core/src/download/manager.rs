//! Download manager
//!
//! Downloads a course's assets sequentially, persisting the cached
//! course through the durable store and publishing per-course progress
//! over watch channels. A failed asset is recorded on the asset and
//! skipped; the course still completes with whatever succeeded.
//! Pause is honored only between assets, never mid-transfer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::manifest::{estimated_total, CourseSource};
use super::DownloadError;
use crate::config::Config;
use crate::models::{CachedCourse, DownloadProgress, DownloadStatus};
use crate::storage::DurableStore;

/// Aggregate local storage report
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageUsage {
    /// Bytes held by cached courses
    pub used_bytes: u64,
    /// Free space on the data volume, when the platform can estimate
    /// it
    pub available_bytes: Option<u64>,
    pub course_count: i64,
}

/// Fetches and persists per-course content with resumable,
/// size-accounted downloads
pub struct DownloadManager {
    store: Arc<DurableStore>,
    source: Arc<dyn CourseSource>,
    assets_dir: PathBuf,
    /// Progress watchers per course; entries survive completion so a
    /// late subscriber still sees the terminal state
    watchers: RwLock<HashMap<String, watch::Sender<DownloadProgress>>>,
}

impl DownloadManager {
    pub fn new(store: Arc<DurableStore>, source: Arc<dyn CourseSource>, config: &Config) -> Self {
        Self {
            store,
            source,
            assets_dir: config.assets_dir(),
            watchers: RwLock::new(HashMap::new()),
        }
    }

    /// Download a course for offline use
    ///
    /// Fetches the manifest, then each asset in order. Returns the
    /// final progress; per-asset failures are recorded, not fatal.
    pub async fn start(
        &self,
        course_id: &str,
        user_id: &str,
    ) -> Result<DownloadProgress, DownloadError> {
        if self.status(course_id) == Some(DownloadStatus::Downloading) {
            return Err(DownloadError::AlreadyActive(course_id.to_string()));
        }
        info!("downloading course {course_id} for user {user_id}");

        let mut progress = DownloadProgress::new(course_id);
        self.publish(&progress);

        let manifest = match self.source.fetch_manifest(course_id).await {
            Ok(manifest) => manifest,
            Err(e) => {
                progress.status = DownloadStatus::Failed;
                progress.error = Some(e.to_string());
                self.publish(&progress);
                return Err(e);
            }
        };

        progress.total_size = manifest.total_size();
        progress.status = DownloadStatus::Downloading;
        self.publish(&progress);

        let mut course = CachedCourse {
            course_id: manifest.course_id,
            title: manifest.title,
            version: manifest.version,
            lessons: manifest.lessons,
            quizzes: manifest.quizzes,
            assets: manifest
                .assets
                .into_iter()
                .map(|mut asset| {
                    asset.downloaded = false;
                    asset
                })
                .collect(),
            downloaded_at: Utc::now(),
            size: 0,
        };

        Ok(self.run_assets(&mut course, progress).await)
    }

    /// Pause an active download; takes effect at the next asset
    /// boundary
    pub fn pause(&self, course_id: &str) {
        let watchers = self.watchers.read().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = watchers.get(course_id) {
            tx.send_if_modified(|progress| {
                if progress.status == DownloadStatus::Downloading {
                    progress.status = DownloadStatus::Paused;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Resume a paused or interrupted download
    ///
    /// Only assets not yet marked downloaded are fetched; an asset
    /// interrupted mid-transfer starts over.
    pub async fn resume(&self, course_id: &str) -> Result<DownloadProgress, DownloadError> {
        if self.status(course_id) == Some(DownloadStatus::Downloading) {
            return Err(DownloadError::AlreadyActive(course_id.to_string()));
        }
        let mut course = self
            .store
            .get_course(course_id)
            .ok_or_else(|| DownloadError::NotCached(course_id.to_string()))?;

        let mut progress = DownloadProgress::new(course_id);
        progress.total_size = estimated_total(&course.lessons, &course.quizzes, &course.assets);
        progress.status = DownloadStatus::Downloading;
        let already: u64 = course
            .assets
            .iter()
            .filter(|a| a.downloaded)
            .map(|a| a.size)
            .sum();
        progress.set_downloaded(already);
        self.publish(&progress);

        Ok(self.run_assets(&mut course, progress).await)
    }

    /// Remove a cached course, its asset files, and its progress entry
    pub fn delete(&self, course_id: &str) -> Result<(), DownloadError> {
        if self.store.get_course(course_id).is_none() {
            return Err(DownloadError::NotCached(course_id.to_string()));
        }
        self.store.delete_course(course_id);

        let dir = self.assets_dir.join(course_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }

        let mut watchers = self.watchers.write().unwrap_or_else(|p| p.into_inner());
        watchers.remove(course_id);
        Ok(())
    }

    /// Current progress for a course, if any download was seen this
    /// session
    pub fn progress(&self, course_id: &str) -> Option<DownloadProgress> {
        let watchers = self.watchers.read().unwrap_or_else(|p| p.into_inner());
        watchers.get(course_id).map(|tx| tx.borrow().clone())
    }

    /// Subscribe to progress updates for a course
    pub fn subscribe(&self, course_id: &str) -> Option<watch::Receiver<DownloadProgress>> {
        let watchers = self.watchers.read().unwrap_or_else(|p| p.into_inner());
        watchers.get(course_id).map(|tx| tx.subscribe())
    }

    /// Progress entries for every course seen this session
    pub fn all_progress(&self) -> Vec<DownloadProgress> {
        let watchers = self.watchers.read().unwrap_or_else(|p| p.into_inner());
        watchers.values().map(|tx| tx.borrow().clone()).collect()
    }

    /// Aggregate used/available space and cached course count
    pub fn storage_usage(&self) -> StorageUsage {
        let probe = self
            .assets_dir
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.assets_dir.clone());
        usage_report(&self.store, &probe)
    }

    /// Fetch every asset not yet downloaded, then persist the course
    ///
    /// Returns the final progress: Paused when a pause request arrived
    /// at an asset boundary, Completed otherwise (even when some
    /// assets failed).
    async fn run_assets(
        &self,
        course: &mut CachedCourse,
        mut progress: DownloadProgress,
    ) -> DownloadProgress {
        let mut downloaded = progress.downloaded_size;
        let mut failed = 0usize;

        for index in 0..course.assets.len() {
            if course.assets[index].downloaded {
                continue;
            }

            if self.status(&progress.course_id) == Some(DownloadStatus::Paused) {
                self.persist(course, downloaded);
                progress.status = DownloadStatus::Paused;
                self.publish(&progress);
                return progress;
            }

            let asset = &course.assets[index];
            match self.source.fetch_asset(asset).await {
                Ok(bytes) => match self.write_asset(&course.course_id, &asset.id, &bytes) {
                    Ok(()) => {
                        downloaded += bytes.len() as u64;
                        course.assets[index].downloaded = true;
                    }
                    Err(e) => {
                        warn!("storing asset {} failed: {e}", asset.id);
                        failed += 1;
                    }
                },
                Err(e) => {
                    warn!("asset {} failed: {e}", asset.id);
                    failed += 1;
                }
            }

            progress.set_downloaded(downloaded);
            // Only the byte counters are broadcast here; a concurrent
            // pause request keeps its status until the boundary check
            self.advance(&progress);
        }

        self.persist(course, downloaded);
        progress.status = DownloadStatus::Completed;
        if failed > 0 {
            progress.error = Some(format!("{failed} asset(s) failed to download"));
        }
        self.publish(&progress);
        progress
    }

    fn persist(&self, course: &mut CachedCourse, downloaded: u64) {
        course.downloaded_at = Utc::now();
        course.size = downloaded;
        self.store.put_course(course);
    }

    fn write_asset(&self, course_id: &str, asset_id: &str, bytes: &[u8]) -> std::io::Result<()> {
        let dir = self.assets_dir.join(course_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(asset_id), bytes)
    }

    fn status(&self, course_id: &str) -> Option<DownloadStatus> {
        self.progress(course_id).map(|p| p.status)
    }

    fn publish(&self, progress: &DownloadProgress) {
        let mut watchers = self.watchers.write().unwrap_or_else(|p| p.into_inner());
        watchers
            .entry(progress.course_id.clone())
            .and_modify(|tx| {
                tx.send_replace(progress.clone());
            })
            .or_insert_with(|| watch::channel(progress.clone()).0);
    }

    /// Broadcast updated byte counters without touching the status
    fn advance(&self, progress: &DownloadProgress) {
        let watchers = self.watchers.read().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = watchers.get(&progress.course_id) {
            tx.send_modify(|current| {
                current.total_size = progress.total_size;
                current.downloaded_size = progress.downloaded_size;
                current.percentage = progress.percentage;
            });
        }
    }
}

/// Compute the storage report for a store and data directory
///
/// Available space comes from the platform; `None` when it cannot be
/// estimated.
pub fn usage_report(store: &DurableStore, data_dir: &std::path::Path) -> StorageUsage {
    StorageUsage {
        used_bytes: store.total_course_bytes(),
        available_bytes: fs2::available_space(data_dir).ok(),
        course_count: store.course_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::manifest::CourseManifest;
    use crate::models::{Asset, AssetKind};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn asset(id: &str, size: u64) -> Asset {
        Asset {
            id: id.to_string(),
            kind: AssetKind::Video,
            url: format!("https://cdn.test/{}", id),
            size,
            downloaded: false,
        }
    }

    struct StubSource {
        manifest: Option<CourseManifest>,
        failing: HashSet<String>,
        calls: StdMutex<Vec<String>>,
        /// When set for an asset id: signal `started`, then wait for
        /// `release` before returning
        gate: Option<(String, Arc<Notify>, Arc<Notify>)>,
    }

    impl StubSource {
        fn new(manifest: CourseManifest) -> Self {
            Self {
                manifest: Some(manifest),
                failing: HashSet::new(),
                calls: StdMutex::new(Vec::new()),
                gate: None,
            }
        }

        fn broken() -> Self {
            Self {
                manifest: None,
                failing: HashSet::new(),
                calls: StdMutex::new(Vec::new()),
                gate: None,
            }
        }

        fn failing_on(mut self, asset_id: &str) -> Self {
            self.failing.insert(asset_id.to_string());
            self
        }

        fn gated_on(mut self, asset_id: &str, started: Arc<Notify>, release: Arc<Notify>) -> Self {
            self.gate = Some((asset_id.to_string(), started, release));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CourseSource for StubSource {
        async fn fetch_manifest(&self, course_id: &str) -> Result<CourseManifest, DownloadError> {
            match self.manifest {
                Some(ref manifest) => Ok(manifest.clone()),
                None => Err(DownloadError::Manifest {
                    course_id: course_id.to_string(),
                    reason: "stub".to_string(),
                }),
            }
        }

        async fn fetch_asset(&self, asset: &Asset) -> Result<Vec<u8>, DownloadError> {
            self.calls.lock().unwrap().push(asset.id.clone());
            if let Some((ref gated, ref started, ref release)) = self.gate {
                if *gated == asset.id {
                    started.notify_one();
                    release.notified().await;
                }
            }
            if self.failing.contains(&asset.id) {
                return Err(DownloadError::Asset {
                    asset_id: asset.id.clone(),
                    reason: "stub".to_string(),
                });
            }
            Ok(vec![0u8; asset.size as usize])
        }
    }

    fn two_asset_manifest() -> CourseManifest {
        CourseManifest {
            course_id: "c1".to_string(),
            title: "Intro".to_string(),
            version: "1".to_string(),
            lessons: Vec::new(),
            quizzes: Vec::new(),
            assets: vec![asset("a1", 10), asset("a2", 20)],
        }
    }

    struct Fixture {
        _temp: TempDir,
        store: Arc<DurableStore>,
        source: Arc<StubSource>,
        manager: Arc<DownloadManager>,
    }

    fn fixture(source: StubSource) -> Fixture {
        let temp = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Default::default()
        };
        let store = Arc::new(DurableStore::open_in_memory().unwrap());
        let source = Arc::new(source);
        let manager = Arc::new(DownloadManager::new(
            store.clone(),
            source.clone(),
            &config,
        ));
        Fixture {
            _temp: temp,
            store,
            source,
            manager,
        }
    }

    #[tokio::test]
    async fn test_download_completes_and_persists() {
        let fx = fixture(StubSource::new(two_asset_manifest()));

        let progress = fx.manager.start("c1", "u1").await.unwrap();

        assert_eq!(progress.status, DownloadStatus::Completed);
        assert_eq!(progress.downloaded_size, 30);
        assert_eq!(progress.percentage, 100.0);
        assert!(progress.error.is_none());

        let course = fx.store.get_course("c1").unwrap();
        assert!(course.is_complete());
        assert_eq!(course.size, 30);

        // Asset bytes landed on disk
        let dir = fx.manager.assets_dir.join("c1");
        assert!(dir.join("a1").exists());
        assert!(dir.join("a2").exists());
    }

    #[tokio::test]
    async fn test_failed_asset_degrades_gracefully() {
        let fx = fixture(StubSource::new(two_asset_manifest()).failing_on("a2"));

        let progress = fx.manager.start("c1", "u1").await.unwrap();

        // The course still completes with whichever assets succeeded
        assert_eq!(progress.status, DownloadStatus::Completed);
        assert_eq!(progress.downloaded_size, 10);
        assert!(progress.error.is_some());

        let course = fx.store.get_course("c1").unwrap();
        assert!(!course.is_complete());
        let a1 = course.assets.iter().find(|a| a.id == "a1").unwrap();
        let a2 = course.assets.iter().find(|a| a.id == "a2").unwrap();
        assert!(a1.downloaded);
        assert!(!a2.downloaded);
    }

    #[tokio::test]
    async fn test_manifest_failure_marks_failed() {
        let fx = fixture(StubSource::broken());

        let err = fx.manager.start("c1", "u1").await.unwrap_err();
        assert!(matches!(err, DownloadError::Manifest { .. }));

        let progress = fx.manager.progress("c1").unwrap();
        assert_eq!(progress.status, DownloadStatus::Failed);
        assert!(progress.error.is_some());

        // Nothing persisted
        assert!(fx.store.get_course("c1").is_none());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_bounded() {
        let manifest = CourseManifest {
            assets: vec![asset("a1", 10), asset("a2", 20), asset("a3", 30)],
            ..two_asset_manifest()
        };
        let fx = fixture(StubSource::new(manifest));

        let manager = fx.manager.clone();
        let download = tokio::spawn(async move { manager.start("c1", "u1").await });

        // Observe updates while the download runs
        let mut observed = Vec::new();
        let mut rx = loop {
            if let Some(rx) = fx.manager.subscribe("c1") {
                break rx;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        };
        loop {
            let progress = rx.borrow_and_update().clone();
            observed.push((progress.downloaded_size, progress.percentage));
            if progress.status.is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }

        download.await.unwrap().unwrap();

        for window in observed.windows(2) {
            assert!(
                window[1].0 >= window[0].0,
                "downloaded_size decreased: {:?}",
                observed
            );
        }
        for (_, percent) in &observed {
            assert!((0.0..=100.0).contains(percent));
        }
    }

    #[tokio::test]
    async fn test_pause_resume_cycle() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = StubSource::new(two_asset_manifest()).gated_on(
            "a1",
            started.clone(),
            release.clone(),
        );
        let fx = fixture(source);

        let manager = fx.manager.clone();
        let download = tokio::spawn(async move { manager.start("c1", "u1").await });

        // Wait until the first asset transfer is in flight
        started.notified().await;

        // Overlapping start is refused while the download runs
        let overlap = fx.manager.start("c1", "u2").await;
        assert!(matches!(overlap, Err(DownloadError::AlreadyActive(_))));

        // Pause lands at the next asset boundary, not mid-transfer
        fx.manager.pause("c1");
        release.notify_one();

        let progress = download.await.unwrap().unwrap();
        assert_eq!(progress.status, DownloadStatus::Paused);
        assert_eq!(progress.downloaded_size, 10);

        // The partial course is persisted with per-asset flags
        let course = fx.store.get_course("c1").unwrap();
        assert!(course.assets.iter().find(|a| a.id == "a1").unwrap().downloaded);
        assert!(!course.assets.iter().find(|a| a.id == "a2").unwrap().downloaded);

        // Resume fetches only the missing asset
        let progress = fx.manager.resume("c1").await.unwrap();
        assert_eq!(progress.status, DownloadStatus::Completed);
        assert_eq!(progress.downloaded_size, 30);
        assert!(fx.store.get_course("c1").unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_resume_skips_downloaded_assets() {
        let fx = fixture(StubSource::new(two_asset_manifest()));

        // A previous session fetched a1 already
        let mut course = CachedCourse {
            course_id: "c1".to_string(),
            title: "Intro".to_string(),
            version: "1".to_string(),
            lessons: Vec::new(),
            quizzes: Vec::new(),
            assets: vec![asset("a1", 10), asset("a2", 20)],
            downloaded_at: Utc::now(),
            size: 10,
        };
        course.assets[0].downloaded = true;
        fx.store.put_course(&course);

        let progress = fx.manager.resume("c1").await.unwrap();

        assert_eq!(progress.status, DownloadStatus::Completed);
        // Only the missing asset was fetched
        assert_eq!(fx.source.calls(), vec!["a2"]);
        assert!(fx.store.get_course("c1").unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_resume_unknown_course_fails() {
        let fx = fixture(StubSource::new(two_asset_manifest()));
        let err = fx.manager.resume("missing").await.unwrap_err();
        assert!(matches!(err, DownloadError::NotCached(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_course_and_progress() {
        let fx = fixture(StubSource::new(two_asset_manifest()));
        fx.manager.start("c1", "u1").await.unwrap();

        fx.manager.delete("c1").unwrap();

        assert!(fx.store.get_course("c1").is_none());
        assert!(fx.manager.progress("c1").is_none());
        assert!(!fx.manager.assets_dir.join("c1").exists());

        // Deleting again reports the missing course
        assert!(matches!(
            fx.manager.delete("c1"),
            Err(DownloadError::NotCached(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_usage_reports_courses() {
        let fx = fixture(StubSource::new(two_asset_manifest()));
        fx.manager.start("c1", "u1").await.unwrap();

        let usage = fx.manager.storage_usage();
        assert_eq!(usage.course_count, 1);
        assert_eq!(usage.used_bytes, 30);
        // Available space comes from the platform and should exist for
        // a temp dir
        assert!(usage.available_bytes.is_some());
    }
}
