use crate::storage::traits::{SnapshotError, SnapshotResult, SnapshotStore};
use crate::storage::{Snapshot, FORMAT_VERSION};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot store backed by a single pretty-printed JSON file
///
/// Saves go through a sibling temp file that is renamed over the target, so
/// a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> SnapshotResult<Option<Snapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| SnapshotError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if snapshot.meta.format_version > FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                path: self.path.clone(),
                found: snapshot.meta.format_version,
            });
        }

        debug!(
            "Loaded snapshot {} with {} entities",
            self.path.display(),
            snapshot.entities.len()
        );
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &Snapshot) -> SnapshotResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let body = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();

        let mut file = fs::File::create(&temp).map_err(|e| self.io_error(e))?;
        file.write_all(&body).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(
            "Saved snapshot {} ({} entities)",
            self.path.display(),
            snapshot.meta.entity_count
        );
        Ok(())
    }
}
