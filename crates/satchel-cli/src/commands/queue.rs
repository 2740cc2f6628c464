//! Queue command handlers

use std::sync::Arc;

use anyhow::{bail, Result};

use satchel_core::{ActionQueue, DurableStore};

use crate::output::Output;

/// List actions awaiting replay
pub fn list(store: Arc<DurableStore>, output: &Output) -> Result<()> {
    let queue = ActionQueue::new(store);
    output.print_actions(&queue.drain());
    Ok(())
}

/// List dead-lettered actions
pub fn dead(store: Arc<DurableStore>, output: &Output) -> Result<()> {
    let queue = ActionQueue::new(store);
    output.print_actions(&queue.dead_letters());
    Ok(())
}

/// Put a dead-lettered action back in the queue
pub fn retry(store: Arc<DurableStore>, id: &str, output: &Output) -> Result<()> {
    let queue = ActionQueue::new(store);
    if !queue.retry_dead(id) {
        bail!("No dead-lettered action with id {id}");
    }
    output.success(&format!("Action {id} re-queued"));
    Ok(())
}
