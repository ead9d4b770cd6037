use std::path::{Path, PathBuf};
use std::time::Duration;

use crypta_sync::{SyncConfig, MAX_RECONNECT_INTERVAL, MIN_RECONNECT_INTERVAL};
use crypta_types::PeerAddress;
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Node settings, usually read from a TOML file.
///
/// ```toml
/// root = "/var/lib/crypta"
/// lock_timeout_secs = 60
/// reconnect_interval_secs = 30
/// bootstrap_address = "..."
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub root: PathBuf,
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
    /// The only address allowed to open a connection to this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_address: Option<String>,
    /// Echo unparseable messages back to their sender. Debugging only.
    #[serde(default)]
    pub echo_unparseable: bool,
}

fn default_lock_timeout_secs() -> u64 {
    60
}

fn default_reconnect_interval_secs() -> u64 {
    30
}

impl NodeConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_secs: default_lock_timeout_secs(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            bootstrap_address: None,
            echo_unparseable: false,
        }
    }

    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> NodeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(NodeError::Config("root must not be empty".into()));
        }
        if self.lock_timeout_secs == 0 {
            return Err(NodeError::Config("lock_timeout_secs must be positive".into()));
        }
        let interval = self.reconnect_interval();
        if interval < MIN_RECONNECT_INTERVAL || interval > MAX_RECONNECT_INTERVAL {
            return Err(NodeError::Config(format!(
                "reconnect_interval_secs must be between {} and {}, got {}",
                MIN_RECONNECT_INTERVAL.as_secs(),
                MAX_RECONNECT_INTERVAL.as_secs(),
                self.reconnect_interval_secs
            )));
        }
        if let Some(addr) = &self.bootstrap_address {
            PeerAddress::new(addr.as_str())
                .map_err(|e| NodeError::Config(format!("bootstrap_address: {e}")))?;
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    /// Engine settings derived from this config.
    pub fn sync_config(&self) -> NodeResult<SyncConfig> {
        let bootstrap_address = self
            .bootstrap_address
            .as_deref()
            .map(PeerAddress::new)
            .transpose()?;
        Ok(SyncConfig {
            lock_timeout: self.lock_timeout(),
            bootstrap_address,
            echo_unparseable: self.echo_unparseable,
        })
    }
}
