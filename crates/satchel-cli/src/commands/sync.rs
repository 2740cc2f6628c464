//! Sync command handler

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use satchel_core::{
    connectivity_channel, ActionQueue, Config, DurableStore, HttpRemoteClient, ProgressTracker,
    SyncScheduler,
};

use crate::output::Output;

/// Run one sync pass against the remote API
pub async fn sync(config: &Config, store: Arc<DurableStore>, output: &Output) -> Result<()> {
    if !config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             satchel config set sync_enabled true\n  \
             satchel config set api_url https://your-server"
        );
    }

    let Some(ref api_url) = config.api_url else {
        bail!(
            "API URL not configured. Set it with:\n  \
             satchel config set api_url https://your-server"
        );
    };

    output.message("Checking connectivity...");
    let online = probe(api_url, config.request_timeout()).await;
    let (_connectivity, monitor) = connectivity_channel(online);

    let tracker = Arc::new(ProgressTracker::new(store.clone()));
    let queue = Arc::new(ActionQueue::new(store));
    let remote = Arc::new(HttpRemoteClient::new(api_url, config.request_timeout())?);

    let pending = tracker.list_pending().len() + queue.len();
    output.message(&format!("Syncing {} pending item(s)...", pending));

    let scheduler = SyncScheduler::new(tracker, queue, remote, monitor);
    match scheduler.sync_now().await {
        Ok(result) => {
            output.print_sync_result(&result);
            Ok(())
        }
        Err(e) => bail!("Sync failed: {e}"),
    }
}

/// Reachability check against the API health endpoint
///
/// This is the CLI's stand-in for the platform connectivity signal a
/// long-running client would provide.
async fn probe(api_url: &str, timeout: Duration) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return false;
    };
    let url = format!("{}/health", api_url.trim_end_matches('/'));
    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}
