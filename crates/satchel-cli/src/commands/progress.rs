//! Progress command handlers

use std::sync::Arc;

use anyhow::{bail, Result};

use satchel_core::{DurableStore, ProgressTracker, ProgressUpdate};

use crate::output::Output;

/// Record local progress for a course
pub fn set(
    store: Arc<DurableStore>,
    course_id: &str,
    user: &str,
    percent: f32,
    lessons: Vec<String>,
    position: Option<String>,
    output: &Output,
) -> Result<()> {
    if !(0.0..=100.0).contains(&percent) {
        bail!("percent must be between 0 and 100");
    }

    let tracker = ProgressTracker::new(store);
    let mut update = ProgressUpdate::new(course_id, user, percent).with_lessons(lessons);
    if let Some(position) = position {
        update = update.with_position(position);
    }

    let record = tracker.save_local(update);
    output.success(&format!(
        "Progress for {} saved at {:.0}% (pending sync)",
        record.course_id, record.percent
    ));
    Ok(())
}

/// Show progress for a course
pub fn show(store: Arc<DurableStore>, course_id: &str, user: &str, output: &Output) -> Result<()> {
    let tracker = ProgressTracker::new(store);
    match tracker.get(course_id, user) {
        Some(record) => output.print_progress(&record),
        None => bail!("No progress recorded for {course_id} by {user}"),
    }
    Ok(())
}

/// List records awaiting sync
pub fn pending(store: Arc<DurableStore>, output: &Output) -> Result<()> {
    let tracker = ProgressTracker::new(store);
    output.print_progress_list(&tracker.list_pending());
    Ok(())
}
