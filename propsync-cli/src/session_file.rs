//! The persisted session bundle (`session.json`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use propsync_core::SessionBundle;

/// A session bundle together with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user_id: String,
    #[serde(flatten)]
    pub bundle: SessionBundle,
}

impl StoredSession {
    /// Loads the stored session, or `None` if nobody is logged in.
    pub fn load(path: &Path) -> Result<Option<Self>, Box<dyn std::error::Error>> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let stored = serde_json::from_str(&contents).map_err(|e| {
                    format!("Failed to parse session file '{}': {}", path.display(), e)
                })?;
                Ok(Some(stored))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Deletes the session file. Returns false if there was none.
    pub fn remove(path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
