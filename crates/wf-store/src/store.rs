//! Snapshot file handling.

use std::fs;
use std::path::{Path, PathBuf};

use crate::migrate::migrate_to_latest;
use crate::snapshot::Snapshot;
use crate::StoreResult;

/// Reads and writes the controller snapshot file.
#[derive(Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and migrate the snapshot. A missing file is a fresh start,
    /// not an error; a corrupt file is an error.
    pub fn load(&self) -> StoreResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(Some(migrate_to_latest(snapshot)?))
    }

    pub fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
