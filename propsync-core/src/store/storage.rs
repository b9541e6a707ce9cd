//! JSON file persistence for Local Store snapshots.

use std::fs;
use std::io;
use std::path::PathBuf;

use super::{LocalStore, Snapshot};

const SNAPSHOT_FILENAME: &str = "store.json";

/// Storage for Local Store snapshots.
///
/// Handles loading and saving the whole store as a single JSON document.
#[derive(Debug, Clone)]
pub struct SnapshotStorage {
    data_dir: PathBuf,
}

impl SnapshotStorage {
    /// Creates a new storage instance rooted at `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the full path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILENAME)
    }

    /// Loads a snapshot from disk.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let path = self.path();

        match fs::read(&path) {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Json(path, e))?;
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }

    /// Loads the stored snapshot into a new [`LocalStore`], or an empty store
    /// if nothing has been saved yet.
    pub fn open_store(&self) -> Result<LocalStore, StorageError> {
        Ok(LocalStore::from_snapshot(self.load()?.unwrap_or_default()))
    }

    /// Saves a snapshot to disk.
    ///
    /// Writes to a temporary file first and renames it into place so a crash
    /// never leaves a truncated snapshot behind.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Io(self.data_dir.clone(), e))?;

        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");
        let bytes =
            serde_json::to_vec_pretty(snapshot).map_err(|e| StorageError::Json(path.clone(), e))?;

        fs::write(&tmp_path, bytes).map_err(|e| StorageError::Io(tmp_path.clone(), e))?;
        fs::rename(&tmp_path, &path).map_err(|e| StorageError::Io(path, e))?;

        Ok(())
    }

    /// Saves the current contents of `store`.
    pub fn save_store(&self, store: &LocalStore) -> Result<(), StorageError> {
        self.save(&store.snapshot())
    }
}

/// Errors that can occur during snapshot storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),
    #[error("Failed to parse snapshot {}: {}", .0.display(), .1)]
    Json(PathBuf, #[source] serde_json::Error),
}
