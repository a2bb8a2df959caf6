//! Storage module for persisting crawl snapshots
//!
//! A snapshot is the whole crawl in one document: the deduplicated entity
//! set, the query memo, counters and completed phases. It doubles as the
//! checkpoint a resumed run starts from and as the final harvest output.

mod json;
mod snapshot;
mod traits;

pub use json::JsonSnapshotStore;
pub use snapshot::{Snapshot, SnapshotMeta, FORMAT_VERSION};
pub use traits::{SnapshotError, SnapshotResult, SnapshotStore};

use std::path::Path;

/// Opens the snapshot store at the configured path
///
/// Nothing is read or created until the first `load` or `save`.
pub fn open_snapshot_store(path: &Path) -> JsonSnapshotStore {
    JsonSnapshotStore::new(path)
}
