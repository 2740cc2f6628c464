//! Remote replay client
//!
//! The sync scheduler talks to the remote system of record through the
//! [`RemoteClient`] capability: one call to upsert a progress record,
//! one to re-issue a recorded request verbatim. The HTTP
//! implementation classifies responses into transient failures (worth
//! retrying) and permanent rejections (dead-letter material).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;

use crate::models::{ProgressRecord, QueuedAction};

/// A failed exchange with the remote system
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Worth retrying on a later pass
    #[error("transient failure: {0}")]
    Transient(String),

    /// A well-formed rejection that retrying will never fix
    #[error("permanent rejection: {0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, RemoteError::Permanent(_))
    }
}

/// Capability for pushing local state to the remote system
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Upsert one progress record against the progress endpoint
    async fn push_progress(&self, record: &ProgressRecord) -> Result<(), RemoteError>;

    /// Re-issue a recorded request verbatim
    async fn replay(&self, action: &QueuedAction) -> Result<(), RemoteError>;
}

/// HTTP implementation of [`RemoteClient`]
pub struct HttpRemoteClient {
    http: Client,
    base_url: String,
}

impl HttpRemoteClient {
    /// Build a client against the given API base URL
    ///
    /// The timeout applies per request; the engine itself imposes no
    /// deadlines.
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
impl RemoteClient for HttpRemoteClient {
    async fn push_progress(&self, record: &ProgressRecord) -> Result<(), RemoteError> {
        let payload = serde_json::json!({
            "courseId": record.course_id,
            "userId": record.user_id,
            "progress": record.percent,
            "completedLessons": record.completed_lessons,
            "lastPosition": record.last_position,
            "updatedAt": record.last_update,
        });

        let response = self
            .http
            .post(format!("{}/progress", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        classify_status(response.status())
    }

    async fn replay(&self, action: &QueuedAction) -> Result<(), RemoteError> {
        let method = Method::from_bytes(action.method.as_bytes())
            .map_err(|_| RemoteError::Permanent(format!("invalid method {}", action.method)))?;

        let mut request = self.http.request(method, &action.url);
        for (name, value) in &action.headers {
            request = request.header(name, value);
        }
        if let Some(ref body) = action.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        classify_status(response.status())
    }
}

/// Map an HTTP status to the retry taxonomy
///
/// 2xx succeeds. 408 and 429 are transient despite being 4xx; other
/// client errors are permanent rejections. Everything else (5xx,
/// redirects that leaked through) is transient.
fn classify_status(status: StatusCode) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RemoteError::Transient(format!("status {}", status)));
    }
    if status.is_client_error() {
        return Err(RemoteError::Permanent(format!("status {}", status)));
    }
    Err(RemoteError::Transient(format!("status {}", status)))
}
