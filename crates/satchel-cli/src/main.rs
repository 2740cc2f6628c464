//! Satchel CLI
//!
//! Command-line interface for Satchel - offline-first course
//! downloads, progress tracking, and sync.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use satchel_core::{Config, DurableStore};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "satchel")]
#[command(about = "Satchel - offline-first learning companion")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show local store contents and sync state
    Status,
    /// Run one sync pass against the remote API
    Sync,
    /// Manage offline course downloads
    Download {
        #[command(subcommand)]
        command: DownloadCommands,
    },
    /// Record or inspect learning progress
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },
    /// Inspect the offline action queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Local notification mailbox
    Notifications {
        #[command(subcommand)]
        command: Option<NotificationCommands>,
    },
    /// Wipe all local data
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, api_url, sync_enabled, sync_interval_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
enum DownloadCommands {
    /// Download a course for offline use
    Start {
        /// Course to download
        course_id: String,
        /// User the download is for
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// Resume a paused or interrupted download
    Resume {
        course_id: String,
    },
    /// Remove a downloaded course and its assets
    #[command(alias = "rm")]
    Delete {
        course_id: String,
    },
    /// List cached courses
    #[command(alias = "ls")]
    List,
    /// Show storage usage
    Usage,
}

#[derive(Subcommand)]
enum ProgressCommands {
    /// Record local progress for a course
    Set {
        course_id: String,
        /// Completion percentage, 0-100
        percent: f32,
        #[arg(short, long, default_value = "local")]
        user: String,
        /// Completed lesson ids (repeatable)
        #[arg(long = "lesson")]
        lessons: Vec<String>,
        /// Position within the last lesson
        #[arg(long)]
        position: Option<String>,
    },
    /// Show progress for a course
    Show {
        course_id: String,
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// List records awaiting sync
    Pending,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List actions awaiting replay
    #[command(alias = "ls")]
    List,
    /// List dead-lettered actions
    Dead,
    /// Put a dead-lettered action back in the queue
    Retry {
        id: String,
    },
}

#[derive(Subcommand)]
enum NotificationCommands {
    /// List notifications (unread by default)
    #[command(alias = "ls")]
    List {
        /// Include already-read notifications
        #[arg(long)]
        all: bool,
    },
    /// Mark a notification as read
    Read {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config doesn't need the store
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(&key, &value, &output)
            }
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
        };
    }

    let config = Config::load()?;
    let store = Arc::new(DurableStore::open(&config));

    match cli.command {
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&config, &store, &output),
        Commands::Sync => commands::sync::sync(&config, store, &output).await,
        Commands::Download { command } => match command {
            DownloadCommands::Start { course_id, user } => {
                commands::download::start(&config, store, &course_id, &user, &output).await
            }
            DownloadCommands::Resume { course_id } => {
                commands::download::resume(&config, store, &course_id, &output).await
            }
            DownloadCommands::Delete { course_id } => {
                commands::download::delete(&config, store, &course_id, &output)
            }
            DownloadCommands::List => commands::download::list(&store, &output),
            DownloadCommands::Usage => commands::download::usage(&config, &store, &output),
        },
        Commands::Progress { command } => match command {
            ProgressCommands::Set {
                course_id,
                percent,
                user,
                lessons,
                position,
            } => commands::progress::set(store, &course_id, &user, percent, lessons, position, &output),
            ProgressCommands::Show { course_id, user } => {
                commands::progress::show(store, &course_id, &user, &output)
            }
            ProgressCommands::Pending => commands::progress::pending(store, &output),
        },
        Commands::Queue { command } => match command {
            QueueCommands::List => commands::queue::list(store, &output),
            QueueCommands::Dead => commands::queue::dead(store, &output),
            QueueCommands::Retry { id } => commands::queue::retry(store, &id, &output),
        },
        Commands::Notifications { command } => match command {
            None => commands::notifications::list(&store, false, &output),
            Some(NotificationCommands::List { all }) => {
                commands::notifications::list(&store, all, &output)
            }
            Some(NotificationCommands::Read { id }) => {
                commands::notifications::read(&store, &id, &output)
            }
        },
        Commands::Reset { yes } => commands::status::reset(&store, yes, &output),
    }
}
