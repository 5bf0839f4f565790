//! # Docroute - Document Routing Index
//!
//! A single-table routing index that records, for a named document/revision
//! pair, the identifiers (UUID, project number, document number) under which
//! the same logical document is known on a client side and a contractor side.
//!
//! Docroute provides:
//! - SQLite-backed storage with lookup by either side's UUID
//! - A connection manager with liveness probing and bounded reconnect retry
//! - A concurrent bulk loader that retries writer-lock contention per row
//! - Thin schema administration for the table and its two UUID indexes

pub mod route;
pub mod storage;
pub mod loader;
pub mod ui;
pub mod config;

// Re-exports for convenient access
pub use route::DocumentRoute;
pub use storage::{ConnectionManager, RouteStore, SchemaAdmin};
pub use loader::{BulkLoader, LoadReport, RetryPolicy};

/// Result type alias for Docroute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Docroute operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database unreachable after {attempts} attempts (gave up at {timestamp})")]
    Timeout {
        attempts: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    #[error("database connection not established")]
    NotConnected,

    #[error("no route found for uuid: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message sent from parallel loader workers to the coordinator
#[derive(Debug)]
pub enum LoadMessage {
    /// A row was committed to the worker's transaction
    Inserted,
    /// A row hit the write lock and is being reattempted
    Retried,
    /// A row was abandoned, with the failure cause
    Skipped(String),
}
