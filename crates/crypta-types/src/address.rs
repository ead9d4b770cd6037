use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Address of a remote peer as handed out by the transport.
///
/// Addresses are opaque to the sync core. They are compared byte for byte
/// and never parsed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Wrap a raw address. Rejects the empty string.
    pub fn new(address: impl Into<String>) -> Result<Self, TypeError> {
        let address = address.into();
        if address.is_empty() {
            return Err(TypeError::EmptyAddress);
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, used when logging.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Debug for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddress({})", self.short())
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for PeerAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert_eq!(PeerAddress::new("").unwrap_err(), TypeError::EmptyAddress);
    }

    #[test]
    fn short_truncates_long_addresses() {
        let addr = PeerAddress::new("0123456789abcdef").unwrap();
        assert_eq!(addr.short(), "01234567");
    }

    #[test]
    fn short_keeps_short_addresses() {
        let addr = PeerAddress::new("abc").unwrap();
        assert_eq!(addr.short(), "abc");
    }

    #[test]
    fn display_is_full_address() {
        let addr: PeerAddress = "0123456789abcdef".parse().unwrap();
        assert_eq!(addr.to_string(), "0123456789abcdef");
        assert_eq!(format!("{addr:?}"), "PeerAddress(01234567)");
    }

    #[test]
    fn deserialize_rejects_empty() {
        assert!(serde_json::from_str::<PeerAddress>("\"\"").is_err());
    }

    #[test]
    fn serde_is_plain_string() {
        let addr = PeerAddress::new("peer-a").unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"peer-a\"");
        let back: PeerAddress = serde_json::from_str("\"peer-a\"").unwrap();
        assert_eq!(back, addr);
    }
}
