//! Course manifests and the content source capability
//!
//! A manifest describes a course's lessons, quizzes, and assets with
//! their declared sizes. The total download size is the sum of asset
//! sizes plus fixed per-lesson and per-quiz estimates for the text
//! content that ships alongside them.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::DownloadError;
use crate::models::{Asset, Lesson, Quiz};

/// Size estimate for a lesson's text content, bytes
pub const LESSON_SIZE_ESTIMATE: u64 = 48 * 1024;

/// Size estimate for a quiz definition, bytes
pub const QUIZ_SIZE_ESTIMATE: u64 = 16 * 1024;

/// Description of a course's downloadable content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseManifest {
    pub course_id: String,
    pub title: String,
    /// Content version; stored on the cached course for refresh checks
    pub version: String,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
    pub assets: Vec<Asset>,
}

impl CourseManifest {
    /// Expected total download size in bytes
    pub fn total_size(&self) -> u64 {
        estimated_total(&self.lessons, &self.quizzes, &self.assets)
    }
}

/// Declared asset bytes plus lesson/quiz content estimates
pub fn estimated_total(lessons: &[Lesson], quizzes: &[Quiz], assets: &[Asset]) -> u64 {
    let asset_bytes: u64 = assets.iter().map(|a| a.size).sum();
    asset_bytes
        + lessons.len() as u64 * LESSON_SIZE_ESTIMATE
        + quizzes.len() as u64 * QUIZ_SIZE_ESTIMATE
}

/// Capability for fetching course content
#[async_trait]
pub trait CourseSource: Send + Sync {
    /// Fetch the manifest for a course
    async fn fetch_manifest(&self, course_id: &str) -> Result<CourseManifest, DownloadError>;

    /// Fetch one asset's bytes
    async fn fetch_asset(&self, asset: &Asset) -> Result<Vec<u8>, DownloadError>;
}

/// HTTP implementation of [`CourseSource`]
pub struct HttpCourseSource {
    http: Client,
    base_url: String,
}

impl HttpCourseSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CourseSource for HttpCourseSource {
    async fn fetch_manifest(&self, course_id: &str) -> Result<CourseManifest, DownloadError> {
        let url = format!("{}/courses/{}/manifest", self.base_url, course_id);
        let manifest = async {
            let response = self.http.get(&url).send().await?;
            let response = response.error_for_status()?;
            response.json::<CourseManifest>().await
        }
        .await
        .map_err(|e: reqwest::Error| DownloadError::Manifest {
            course_id: course_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(manifest)
    }

    async fn fetch_asset(&self, asset: &Asset) -> Result<Vec<u8>, DownloadError> {
        let bytes = async {
            let response = self.http.get(&asset.url).send().await?;
            let response = response.error_for_status()?;
            response.bytes().await
        }
        .await
        .map_err(|e: reqwest::Error| DownloadError::Asset {
            asset_id: asset.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
