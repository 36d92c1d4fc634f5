/*
    cache.rs - JSON snapshot cache for a store

    One JSON array of items per store, at <cache dir>/<file name>.

    Features:
    - Atomic writes (write to a unique temp file, then rename)
    - Permissive reads: a missing, unreadable or undecodable file is a miss
*/

use super::errors::StoreResult;
use super::traits::StoreItem;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// On-disk snapshot of one store's items
#[derive(Debug, Clone)]
pub struct SnapshotCache<T> {
    path: PathBuf,
    _items: PhantomData<fn() -> T>,
}

impl<T: StoreItem> SnapshotCache<T> {
    /// Cache for `T` under `dir`, using the type's declared file name
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::at(dir.as_ref().join(T::CACHE_FILE))
    }

    /// Cache at an explicit path
    pub fn at(path: PathBuf) -> Self {
        SnapshotCache {
            path,
            _items: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; every failure is reported as a miss
    pub fn load(&self) -> Option<Vec<T>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) => {
                debug!(store = T::TYPE_LABEL, path = %self.path.display(), error = %e, "Cache miss");
                return None;
            }
        };

        match serde_json::from_slice::<Vec<T>>(&data) {
            Ok(items) => Some(items.into_iter().filter(|item| item.is_valid()).collect()),
            Err(e) => {
                warn!(store = T::TYPE_LABEL, path = %self.path.display(), error = %e, "Discarding undecodable cache");
                None
            }
        }
    }

    /// Replace the snapshot with `items`
    ///
    /// Each write goes through its own temp file in the target directory.
    /// Callers serialize writes to one snapshot.
    pub fn save(&self, items: &[T]) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let data = serde_json::to_vec(items)?;

        // Write to a unique temporary file first
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;

        // Atomically rename to final name
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!(store = T::TYPE_LABEL, count = items.len(), "Cache snapshot written");
        Ok(())
    }

    /// Remove the snapshot if present
    pub fn clear(&self) -> StoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
