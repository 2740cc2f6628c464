//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use satchel_core::{
    CachedCourse, NotificationRecord, ProgressRecord, QueuedAction, StorageUsage, SyncResult,
};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the outcome of a sync pass
    pub fn print_sync_result(&self, result: &SyncResult) {
        match self.format {
            OutputFormat::Human => {
                if result.success {
                    println!("✓ Sync complete: {} item(s) synced", result.synced_items);
                } else {
                    println!(
                        "Sync finished with failures: {} synced, {} failed",
                        result.synced_items, result.failed_items
                    );
                    for error in &result.errors {
                        println!("  - {}", error);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(result).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{} {}", result.synced_items, result.failed_items);
            }
        }
    }

    /// Print a list of cached courses
    pub fn print_courses(&self, courses: &[CachedCourse]) {
        match self.format {
            OutputFormat::Human => {
                if courses.is_empty() {
                    println!("No courses downloaded.");
                    return;
                }
                for course in courses {
                    let missing = course.missing_assets().len();
                    let state = if missing == 0 {
                        "complete".to_string()
                    } else {
                        format!("{} asset(s) missing", missing)
                    };
                    println!(
                        "{} | {} | v{} | {} | {}",
                        course.course_id,
                        truncate(&course.title, 35),
                        course.version,
                        human_bytes(course.size),
                        state
                    );
                }
                println!("\n{} course(s)", courses.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(courses).unwrap());
            }
            OutputFormat::Quiet => {
                for course in courses {
                    println!("{}", course.course_id);
                }
            }
        }
    }

    /// Print a single progress record
    pub fn print_progress(&self, record: &ProgressRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("Course:   {}", record.course_id);
                println!("User:     {}", record.user_id);
                println!("Progress: {:.0}%", record.percent);
                if !record.completed_lessons.is_empty() {
                    println!("Lessons:  {}", record.completed_lessons.join(", "));
                }
                if let Some(ref position) = record.last_position {
                    println!("Position: {}", position);
                }
                println!("Updated:  {}", record.last_update.format("%Y-%m-%d %H:%M"));
                println!(
                    "State:    {}",
                    if record.is_pending {
                        "pending sync"
                    } else {
                        "synced"
                    }
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(record).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{:.0}", record.percent);
            }
        }
    }

    /// Print a list of progress records
    pub fn print_progress_list(&self, records: &[ProgressRecord]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No progress records.");
                    return;
                }
                for record in records {
                    let state = if record.is_pending { "pending" } else { "synced" };
                    println!(
                        "{} | {} | {:.0}% | {}",
                        record.course_id, record.user_id, record.percent, state
                    );
                }
                println!("\n{} record(s)", records.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(records).unwrap());
            }
            OutputFormat::Quiet => {
                for record in records {
                    println!("{}:{}", record.course_id, record.user_id);
                }
            }
        }
    }

    /// Print queued actions
    pub fn print_actions(&self, actions: &[QueuedAction]) {
        match self.format {
            OutputFormat::Human => {
                if actions.is_empty() {
                    println!("Queue is empty.");
                    return;
                }
                for action in actions {
                    println!(
                        "{} | {} {} | retries: {}",
                        action.id,
                        action.method,
                        truncate(&action.url, 45),
                        action.retry_count
                    );
                }
                println!("\n{} action(s)", actions.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(actions).unwrap());
            }
            OutputFormat::Quiet => {
                for action in actions {
                    println!("{}", action.id);
                }
            }
        }
    }

    /// Print notifications
    pub fn print_notifications(&self, notifications: &[NotificationRecord]) {
        match self.format {
            OutputFormat::Human => {
                if notifications.is_empty() {
                    println!("No notifications.");
                    return;
                }
                for notification in notifications {
                    let marker = if notification.is_read { " " } else { "*" };
                    println!(
                        "{} {} | {} | {}",
                        marker,
                        notification.timestamp.format("%Y-%m-%d %H:%M"),
                        truncate(&notification.title, 30),
                        truncate_line(&notification.body, 40)
                    );
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(notifications).unwrap());
            }
            OutputFormat::Quiet => {
                for notification in notifications {
                    println!("{}", notification.id);
                }
            }
        }
    }

    /// Print the storage usage report
    pub fn print_usage(&self, usage: &StorageUsage) {
        match self.format {
            OutputFormat::Human => {
                println!("Courses:   {}", usage.course_count);
                println!("Used:      {}", human_bytes(usage.used_bytes));
                match usage.available_bytes {
                    Some(available) => println!("Available: {}", human_bytes(available)),
                    None => println!("Available: unknown"),
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(usage).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", usage.used_bytes);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Render a byte count for humans
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
