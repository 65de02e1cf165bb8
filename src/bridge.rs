//! Snapshot export and import for handing a warmed cache to another process
//!
//! The bridge works directly on the store and is independent of any binding.
//! Text is the JSON produced by [`CacheStore::snapshot`]; files hold the same
//! text.

use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::cache::CacheStore;
use crate::error::SnapshotError;

/// File name used for the default snapshot location
const SNAPSHOT_FILE: &str = "snapshot.json";

/// Exports and imports the full contents of a cache store
#[derive(Debug, Clone)]
pub struct SnapshotBridge {
    store: Arc<CacheStore>,
}

impl SnapshotBridge {
    /// Creates a bridge over `store`
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Default snapshot path in the XDG cache directory
    ///
    /// Uses `~/.cache/fetchcache/snapshot.json` on Linux, or the equivalent on
    /// other platforms. Returns `None` if no home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "fetchcache")?;
        Some(project_dirs.cache_dir().join(SNAPSHOT_FILE))
    }

    /// Serializes the whole store to JSON text
    pub fn export(&self) -> String {
        self.store.snapshot()
    }

    /// Merges snapshot text into the store
    ///
    /// # Returns
    /// * `Ok(n)` with the number of entries merged
    /// * `Err(SnapshotError::Malformed)` if the text cannot be parsed; the store is unchanged
    pub fn import(&self, text: &str) -> Result<usize, SnapshotError> {
        self.store.restore(text)
    }

    /// Writes the snapshot to `path`, creating parent directories as needed
    pub fn export_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.export())?;
        info!(path = %path.display(), entries = self.store.len(), "Exported cache snapshot");
        Ok(())
    }

    /// Reads a snapshot file and merges it into the store
    ///
    /// Has the same all-or-nothing guarantee as [`import`](Self::import).
    pub fn import_from_file(&self, path: &Path) -> Result<usize, SnapshotError> {
        let text = fs::read_to_string(path)?;
        self.import(&text)
    }
}
