//! Bookkeeping for inbound transfers a peer has announced.
//!
//! A `push` from the lock holder records a [`PendingTransfer`]. The transport
//! asks [`TransferTable::accept`] before it takes any bytes, which moves the
//! entry into an in-flight set. The entry is consumed exactly once when the
//! transfer completes or is canceled, even if the session ended meanwhile.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crypta_types::{ObjectType, PeerAddress};
use tracing::debug;

/// Identifies one permitted transfer: a peer delivering one object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransferKey {
    pub address: PeerAddress,
    pub identification: String,
}

impl TransferKey {
    pub fn new(address: &PeerAddress, identification: impl Into<String>) -> Self {
        Self {
            address: address.clone(),
            identification: identification.into(),
        }
    }

    /// File name for staging this transfer.
    ///
    /// Derived from the key but never contains peer-chosen path characters.
    pub fn staging_name(&self) -> String {
        blake3::hash(self.to_string().as_bytes()).to_hex().to_string()
    }
}

impl fmt::Display for TransferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.identification)
    }
}

/// What a `push` announced, and where its bytes are staged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransfer {
    pub obj_type: ObjectType,
    pub identification: String,
    pub name: Option<String>,
    pub staging_path: PathBuf,
}

#[derive(Default)]
struct Entries {
    /// Announced by a `push`, not yet offered by the transport.
    allowed: HashMap<TransferKey, PendingTransfer>,
    /// Accepted by the transport and in flight, keyed by staging path.
    accepted: HashMap<PathBuf, (TransferKey, PendingTransfer)>,
}

pub struct TransferTable {
    staging_dir: PathBuf,
    entries: Mutex<Entries>,
}

impl TransferTable {
    /// Create a table staging inbound files under `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn staging_path(&self, key: &TransferKey) -> PathBuf {
        self.staging_dir.join(key.staging_name())
    }

    /// Permit `address` to deliver `identification`. Overwrites any previous
    /// permission for the same pair and returns the staging path.
    pub fn allow(
        &self,
        address: &PeerAddress,
        obj_type: ObjectType,
        identification: &str,
        name: Option<String>,
    ) -> PathBuf {
        let key = TransferKey::new(address, identification);
        let staging_path = self.staging_path(&key);
        let pending = PendingTransfer {
            obj_type,
            identification: identification.to_string(),
            name,
            staging_path: staging_path.clone(),
        };
        self.entries().allowed.insert(key, pending);
        debug!(peer = %address.short(), identification, %obj_type, "transfer allowed");
        staging_path
    }

    /// Staging path for an allowed transfer, or `None` if it was never
    /// allowed. Does not change the entry.
    pub fn resolve(&self, address: &PeerAddress, identification: &str) -> Option<PathBuf> {
        let key = TransferKey::new(address, identification);
        self.entries()
            .allowed
            .get(&key)
            .map(|p| p.staging_path.clone())
    }

    /// Move an allowed transfer into the in-flight set and return its
    /// staging path. In-flight entries survive [`TransferTable::purge_by_address`]
    /// and are consumed by [`TransferTable::consume_staged`].
    pub fn accept(&self, address: &PeerAddress, identification: &str) -> Option<PathBuf> {
        let key = TransferKey::new(address, identification);
        let mut entries = self.entries();
        let pending = entries.allowed.remove(&key)?;
        let path = pending.staging_path.clone();
        entries.accepted.insert(path.clone(), (key, pending));
        Some(path)
    }

    /// Fetch and delete an allowed entry that was never accepted.
    pub fn consume(&self, key: &TransferKey) -> Option<PendingTransfer> {
        self.entries().allowed.remove(key)
    }

    /// Fetch and delete the entry of `address` staged at `staging_path`,
    /// in flight or merely allowed.
    pub fn consume_staged(
        &self,
        address: &PeerAddress,
        staging_path: &Path,
    ) -> Option<(TransferKey, PendingTransfer)> {
        let mut entries = self.entries();
        let in_flight = entries
            .accepted
            .get(staging_path)
            .is_some_and(|(k, _)| k.address == *address);
        if in_flight {
            return entries.accepted.remove(staging_path);
        }
        let key = entries
            .allowed
            .iter()
            .find(|(k, p)| k.address == *address && p.staging_path == staging_path)
            .map(|(k, _)| k.clone())?;
        entries.allowed.remove_entry(&key)
    }

    /// Drop every permission held by `address` that the transport has not
    /// accepted yet. Returns how many were removed.
    ///
    /// Transfers already in flight are not interrupted; their completion
    /// still finds its entry.
    pub fn purge_by_address(&self, address: &PeerAddress) -> usize {
        let mut entries = self.entries();
        let before = entries.allowed.len();
        entries.allowed.retain(|k, _| k.address != *address);
        let removed = before - entries.allowed.len();
        if removed > 0 {
            debug!(peer = %address.short(), removed, "transfer permissions purged");
        }
        removed
    }

    /// Whether `address` may still offer `identification`.
    pub fn contains(&self, address: &PeerAddress, identification: &str) -> bool {
        self.entries()
            .allowed
            .contains_key(&TransferKey::new(address, identification))
    }

    pub fn is_in_flight(&self, staging_path: &Path) -> bool {
        self.entries().accepted.contains_key(staging_path)
    }

    /// Allowed plus in-flight entries.
    pub fn len(&self) -> usize {
        let entries = self.entries();
        entries.allowed.len() + entries.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TransferTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferTable")
            .field("staging_dir", &self.staging_dir)
            .field("pending", &self.len())
            .finish()
    }
}
