//! Download command handlers

use std::sync::Arc;

use anyhow::{bail, Result};

use satchel_core::{
    usage_report, Config, DownloadManager, DownloadStatus, DurableStore, HttpCourseSource,
};

use crate::output::{human_bytes, Output};

fn manager(config: &Config, store: Arc<DurableStore>) -> Result<DownloadManager> {
    let Some(ref api_url) = config.api_url else {
        bail!(
            "API URL not configured. Set it with:\n  \
             satchel config set api_url https://your-server"
        );
    };
    let source = Arc::new(HttpCourseSource::new(api_url, config.request_timeout())?);
    Ok(DownloadManager::new(store, source, config))
}

/// Download a course for offline use
pub async fn start(
    config: &Config,
    store: Arc<DurableStore>,
    course_id: &str,
    user: &str,
    output: &Output,
) -> Result<()> {
    let manager = manager(config, store)?;

    output.message(&format!("Downloading course {course_id}..."));
    let progress = manager.start(course_id, user).await?;

    match progress.status {
        DownloadStatus::Completed => match progress.error {
            None => output.success(&format!(
                "Course {} downloaded ({})",
                course_id,
                human_bytes(progress.downloaded_size)
            )),
            Some(ref detail) => output.message(&format!(
                "Course {} downloaded with gaps: {} ({} stored)",
                course_id,
                detail,
                human_bytes(progress.downloaded_size)
            )),
        },
        status => output.message(&format!("Download ended with status {:?}", status)),
    }
    Ok(())
}

/// Resume a paused or interrupted download
pub async fn resume(
    config: &Config,
    store: Arc<DurableStore>,
    course_id: &str,
    output: &Output,
) -> Result<()> {
    let manager = manager(config, store)?;

    output.message(&format!("Resuming download of {course_id}..."));
    let progress = manager.resume(course_id).await?;

    output.success(&format!(
        "Course {} now at {:.0}% ({})",
        course_id,
        progress.percentage,
        human_bytes(progress.downloaded_size)
    ));
    Ok(())
}

/// Remove a downloaded course and its assets
pub fn delete(
    config: &Config,
    store: Arc<DurableStore>,
    course_id: &str,
    output: &Output,
) -> Result<()> {
    let manager = manager(config, store)?;
    manager.delete(course_id)?;
    output.success(&format!("Removed course {course_id}"));
    Ok(())
}

/// List cached courses
pub fn list(store: &DurableStore, output: &Output) -> Result<()> {
    output.print_courses(&store.all_courses());
    Ok(())
}

/// Show storage usage
pub fn usage(config: &Config, store: &DurableStore, output: &Output) -> Result<()> {
    output.print_usage(&usage_report(store, &config.data_dir));
    Ok(())
}
