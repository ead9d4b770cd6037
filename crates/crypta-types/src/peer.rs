use serde::{Deserialize, Serialize};

use crate::address::PeerAddress;
use crate::error::TypeError;

/// A known peer, persisted on disk by the layer that manages trust.
///
/// The sync core only ever reads these records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: PeerAddress,
    pub name: String,
    #[serde(default)]
    pub trusted: bool,
}

impl PeerRecord {
    pub fn new(address: PeerAddress, name: impl Into<String>, trusted: bool) -> Self {
        Self {
            address,
            name: name.into(),
            trusted,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
