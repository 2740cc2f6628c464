//! Storage error handling
//!
//! Typed errors for durable-store operations. These never cross the
//! store's public boundary: failed reads become empty results and
//! failed writes are dropped, with the error logged.

use std::io;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
