//! Sync engine
//!
//! Reconciles locally written state with the remote system of record
//! once connectivity allows: pending progress records first, then the
//! offline action queue in FIFO order.
//!
//! - `connectivity`: the boolean online/offline signal the scheduler
//!   observes
//! - `remote`: the replay client capability and its HTTP
//!   implementation
//! - `scheduler`: the pass state machine, result aggregation, and the
//!   spawned periodic loop

pub mod connectivity;
pub mod remote;
pub mod scheduler;

pub use connectivity::{connectivity_channel, ConnectivityHandle, ConnectivityMonitor};
pub use remote::{HttpRemoteClient, RemoteClient, RemoteError};
pub use scheduler::{
    SchedulerCommand, SchedulerHandle, SyncError, SyncEvent, SyncPhase, SyncScheduler,
};
