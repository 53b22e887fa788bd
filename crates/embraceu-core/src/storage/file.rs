//! Directory-backed storage: one file per key.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::{normalize_key, storage_error, KeyValueStore};
use crate::Result;

const TEMP_SUFFIX: &str = ".tmp";

/// Keys never start with '.', so temp names cannot collide with a stored key.
fn temp_name(key: &str) -> String {
    format!(".{key}{TEMP_SUFFIX}")
}

/// Stores each key as a file inside `root`.
///
/// Writes land in a hidden sibling temp file, are flushed to disk, and are
/// then renamed over the target, so a crash mid-write leaves either the old
/// or the new value.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if missing) a storage directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(normalize_key(key)?))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(storage_error("read", key, error)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let temp_path = self.root.join(temp_name(key));

        let mut file = std::fs::File::create(&temp_path)
            .map_err(|error| storage_error("create", key, error))?;
        file.write_all(value.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|error| storage_error("write", key, error))?;
        drop(file);
        std::fs::rename(&temp_path, &path).map_err(|error| storage_error("rename", key, error))?;
        tracing::trace!("Persisted {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_error("remove", key, error)),
        }
    }
}
