//! Durable storage
//!
//! SQLite-backed keyed collections with secondary indexes, plus the
//! disabled (no-op) degradation used when the platform offers no
//! persistent storage.

pub mod error;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::DurableStore;
