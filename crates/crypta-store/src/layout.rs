//! On-disk layout of a node root.
//!
//! ```text
//! <root>/
//!   model.json            model file
//!   objects/              DirectoryStorage content
//!   org/
//!     auth.json           auth file
//!     peers/<id>          one identity file per peer
//!   temp/
//!     sending/            outbound staging
//!     receiving/          inbound staging
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crypta_types::ObjectType;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

pub const MODEL_FILE: &str = "model.json";
pub const OBJECTS_DIR: &str = "objects";
pub const ORG_DIR: &str = "org";
pub const PEERS_DIR: &str = "peers";
pub const AUTH_FILE: &str = "auth.json";
pub const TEMP_DIR: &str = "temp";
pub const SENDING_DIR: &str = "sending";
pub const RECEIVING_DIR: &str = "receiving";

/// Maps the logical names the sync core uses onto paths under a node root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLayout {
    root: PathBuf,
}

impl NodeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    pub fn peers_dir(&self) -> PathBuf {
        self.root.join(ORG_DIR).join(PEERS_DIR)
    }

    pub fn auth_path(&self) -> PathBuf {
        self.root.join(ORG_DIR).join(AUTH_FILE)
    }

    pub fn sending_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR).join(SENDING_DIR)
    }

    pub fn receiving_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR).join(RECEIVING_DIR)
    }

    /// Path of the identity file for peer `identification`.
    pub fn peer_path(&self, identification: &str) -> StoreResult<PathBuf> {
        validate_file_name(identification)?;
        Ok(self.peers_dir().join(identification))
    }

    /// Directories every node needs, parents first.
    fn directories(&self) -> Vec<PathBuf> {
        vec![
            self.root.clone(),
            self.objects_dir(),
            self.root.join(ORG_DIR),
            self.peers_dir(),
            self.root.join(TEMP_DIR),
            self.sending_dir(),
            self.receiving_dir(),
        ]
    }

    /// Returns `true` if every layout directory exists.
    pub fn is_complete(&self) -> bool {
        self.directories().iter().all(|d| d.is_dir())
    }

    /// Create the missing layout directories.
    ///
    /// Returns the directories that were actually created, parents first, so
    /// a caller can roll back with [`NodeLayout::remove_created`].
    pub fn create(&self) -> StoreResult<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in self.directories() {
            if dir.is_dir() {
                continue;
            }
            if let Err(e) = fs::create_dir(&dir) {
                Self::remove_created(&created);
                return Err(e.into());
            }
            debug!(dir = %dir.display(), "created layout directory");
            created.push(dir);
        }
        Ok(created)
    }

    /// Best-effort removal of directories returned by [`NodeLayout::create`].
    pub fn remove_created(created: &[PathBuf]) {
        for dir in created.iter().rev() {
            if let Err(e) = fs::remove_dir_all(dir) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(dir = %dir.display(), error = %e, "rollback failed to remove directory");
                }
            }
        }
    }

    /// Path of the well-known file backing `kind`.
    ///
    /// `identification` only matters for [`ObjectType::Peer`].
    pub fn well_known_path(&self, kind: ObjectType, identification: &str) -> StoreResult<PathBuf> {
        match kind {
            ObjectType::Model => Ok(self.model_path()),
            ObjectType::Auth => Ok(self.auth_path()),
            ObjectType::Peer => self.peer_path(identification),
            ObjectType::Object => Err(StoreError::NotWellKnown(kind)),
        }
    }

    /// Read a well-known file. Returns `Ok(None)` if it does not exist.
    pub fn read_well_known(
        &self,
        kind: ObjectType,
        identification: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        let path = self.well_known_path(kind, identification)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite a well-known file.
    pub fn write_well_known(
        &self,
        kind: ObjectType,
        identification: &str,
        data: &[u8],
    ) -> StoreResult<()> {
        let path = self.well_known_path(kind, identification)?;
        write_atomic(&path, data)
    }

    /// Remove a well-known file. Returns `true` if it existed.
    pub fn remove_well_known(&self, kind: ObjectType, identification: &str) -> StoreResult<bool> {
        let path = self.well_known_path(kind, identification)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reject names that would escape their directory.
pub(crate) fn validate_file_name(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() {
        Some("empty")
    } else if name == "." || name == ".." {
        Some("relative component")
    } else if name.contains('/') || name.contains('\\') {
        Some("contains a path separator")
    } else if name.contains('\0') {
        Some("contains a NUL byte")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidKey {
            key: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Replace `path` with `data` via a temporary file in the same directory.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::LayoutMissing(path.display().to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
