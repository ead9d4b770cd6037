use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Classification of a synchronized item.
///
/// The type decides where an object lives: `Object` goes through the
/// generic content store, the other three map onto well-known files owned
/// by the node layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Opaque encrypted content, stored by identification.
    Object,
    /// The single model file describing the synchronized tree.
    Model,
    /// A per-peer identity file.
    Peer,
    /// The single authentication file.
    Auth,
}

impl ObjectType {
    pub const ALL: [ObjectType; 4] = [Self::Object, Self::Model, Self::Peer, Self::Auth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Model => "model",
            Self::Peer => "peer",
            Self::Auth => "auth",
        }
    }

    /// Whether the type is backed by a well-known file rather than the store.
    pub fn is_well_known(&self) -> bool {
        !matches!(self, Self::Object)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownObjectType(s.to_string()))
    }
}
