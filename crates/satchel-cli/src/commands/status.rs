//! Status command handler

use std::io::Write;

use anyhow::{bail, Result};

use satchel_core::{usage_report, Config, DurableStore};

use crate::output::{human_bytes, Output, OutputFormat};

/// Show status information
pub fn show(config: &Config, store: &DurableStore, output: &Output) -> Result<()> {
    let courses = store.course_count();
    let pending_progress = store.pending_progress().len();
    let queued = store.live_actions().len();
    let dead = store.dead_actions().len();
    let unread = store.unread_notifications().len();
    let usage = usage_report(store, &config.data_dir);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "persistent": store.is_persistent(),
                    "sync_enabled": config.sync_enabled,
                    "api_url": config.api_url,
                    "storage": {
                        "location": config.data_dir,
                        "used_bytes": usage.used_bytes,
                        "available_bytes": usage.available_bytes,
                    },
                    "counts": {
                        "courses": courses,
                        "pending_progress": pending_progress,
                        "queued_actions": queued,
                        "dead_letters": dead,
                        "unread_notifications": unread,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{} {} {}", courses, pending_progress, queued);
        }
        OutputFormat::Human => {
            println!("Satchel Status");
            println!("==============");
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(ref url) = config.api_url {
                println!("  Server: {}", url);
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            if !store.is_persistent() {
                println!("  Mode:     in-memory only (persistent storage unavailable)");
            }
            println!("  Used:     {}", human_bytes(usage.used_bytes));
            println!();
            println!("Contents:");
            println!("  Courses:          {}", courses);
            println!("  Pending progress: {}", pending_progress);
            println!("  Queued actions:   {}", queued);
            if dead > 0 {
                println!("  Dead letters:     {}", dead);
            }
            println!("  Unread:           {}", unread);
        }
    }

    Ok(())
}

/// Wipe all local data
pub fn reset(store: &DurableStore, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.format == OutputFormat::Human {
        print!("This removes all local data. Continue? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            bail!("Aborted");
        }
    }

    store.clear();
    output.success("Local data cleared");
    Ok(())
}
