//! Notification command handlers

use anyhow::Result;

use satchel_core::DurableStore;

use crate::output::Output;

/// List notifications; unread only unless `all` is set
pub fn list(store: &DurableStore, all: bool, output: &Output) -> Result<()> {
    let notifications = if all {
        store.recent_notifications(50)
    } else {
        store.unread_notifications()
    };
    output.print_notifications(&notifications);
    Ok(())
}

/// Mark a notification as read
pub fn read(store: &DurableStore, id: &str, output: &Output) -> Result<()> {
    store.mark_notification_read(id);
    output.success("Marked as read");
    Ok(())
}
