use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::layout::{write_atomic, NodeLayout};
use crate::traits::Storage;

/// File-per-object storage.
///
/// Each key is stored at `<dir>/<hex(key)>`, so arbitrary keys chosen by
/// remote peers never turn into path components.
#[derive(Clone, Debug)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Open storage rooted at an existing directory.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(StoreError::LayoutMissing(dir.display().to_string()));
        }
        Ok(Self { dir })
    }

    /// Open the objects directory of a node layout.
    pub fn for_layout(layout: &NodeLayout) -> StoreResult<Self> {
        Self::open(layout.objects_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: String::new(),
                reason: "empty".into(),
            });
        }
        Ok(self.dir.join(hex::encode(key.as_bytes())))
    }
}

impl Storage for DirectoryStorage {
    fn store(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, data)?;
        debug!(key, bytes = data.len(), "object stored");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.path_for(key)?.is_file())
    }
}
