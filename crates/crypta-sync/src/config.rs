use std::time::Duration;

use crypta_types::PeerAddress;

use crate::lock::DEFAULT_LOCK_TIMEOUT;

/// Engine-level settings.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// How long a lock stays valid without a refresh.
    pub lock_timeout: Duration,
    /// The only address whose connection request is accepted.
    pub bootstrap_address: Option<PeerAddress>,
    /// Echo unparseable payloads back to the sender (debug tooling only).
    pub echo_unparseable: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            bootstrap_address: None,
            echo_unparseable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SyncConfig::default();
        assert_eq!(c.lock_timeout, Duration::from_secs(60));
        assert!(c.bootstrap_address.is_none());
        assert!(!c.echo_unparseable);
    }
}
