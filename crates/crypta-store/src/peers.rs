use std::fs;
use std::path::{Path, PathBuf};

use crypta_types::PeerRecord;

use crate::error::StoreResult;
use crate::layout::{write_atomic, NodeLayout};

/// Read access to the per-peer identity files of a node.
///
/// The records are written by the layer that manages trust (or arrive via
/// sync as [`ObjectType::Peer`](crypta_types::ObjectType::Peer) files).
#[derive(Clone, Debug)]
pub struct PeerDirectory {
    dir: PathBuf,
}

impl PeerDirectory {
    pub fn new(layout: &NodeLayout) -> Self {
        Self {
            dir: layout.peers_dir(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifications of all peer files, sorted.
    pub fn ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Temporary files from an interrupted atomic write start with '.'.
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load and decode one peer record.
    pub fn load(&self, identification: &str) -> StoreResult<PeerRecord> {
        crate::layout::validate_file_name(identification)?;
        let data = fs::read(self.dir.join(identification))?;
        Ok(PeerRecord::from_json(&data)?)
    }

    /// Persist a peer record under `identification`.
    pub fn save(&self, identification: &str, record: &PeerRecord) -> StoreResult<()> {
        crate::layout::validate_file_name(identification)?;
        write_atomic(&self.dir.join(identification), &record.to_json()?)
    }
}
