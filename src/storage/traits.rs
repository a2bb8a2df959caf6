//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::storage::Snapshot;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {path} is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot {path} uses format version {found}, which this build cannot read")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Trait for snapshot backend implementations
///
/// The crawl loop is the only caller, so implementations need not
/// coordinate concurrent writers.
pub trait SnapshotStore {
    /// Loads the last saved snapshot
    ///
    /// Returns `Ok(None)` when nothing has been saved yet. A snapshot that
    /// exists but cannot be read is an error; it is never silently replaced.
    fn load(&self) -> SnapshotResult<Option<Snapshot>>;

    /// Persists a snapshot, replacing the previous one
    ///
    /// After a successful return the new snapshot is durable. A failed save
    /// leaves the previous snapshot readable.
    fn save(&mut self, snapshot: &Snapshot) -> SnapshotResult<()>;
}
