//! Connectivity signal
//!
//! The engine does not detect connectivity itself; it consumes a
//! boolean online/offline signal published by the host platform. Any
//! source (a network-change callback, an OS timer probing a health
//! endpoint, a test) can drive the handle side.

use tokio::sync::watch;

/// Create a connectivity signal pair
pub fn connectivity_channel(initially_online: bool) -> (ConnectivityHandle, ConnectivityMonitor) {
    let (tx, rx) = watch::channel(initially_online);
    (ConnectivityHandle { tx }, ConnectivityMonitor { rx })
}

/// Publisher side of the connectivity signal
pub struct ConnectivityHandle {
    tx: watch::Sender<bool>,
}

impl ConnectivityHandle {
    /// Publish the current online state
    ///
    /// Observers are only woken on actual transitions.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }
}

/// Observer side of the connectivity signal
#[derive(Clone)]
pub struct ConnectivityMonitor {
    rx: watch::Receiver<bool>,
}

impl ConnectivityMonitor {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Subscribe to transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}
