use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use crypta_store::{DirectoryStorage, NodeLayout, PeerDirectory, Storage};
use crypta_sync::{ReconnectHandle, ReconnectLoop, SyncEngine, Transport, TransportEvents};
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

/// A running Crypta peer: the sync engine plus its background reconnection.
///
/// The transport delivers inbound events to [`Node::events`]. Call
/// [`Node::start`] once the transport is up and [`Node::shutdown`] to stop
/// the background loop before the transport is closed.
pub struct Node {
    config: NodeConfig,
    engine: Arc<SyncEngine>,
    transport: Arc<dyn Transport>,
    reconnect: Option<ReconnectHandle>,
}

impl Node {
    /// Initialize a new node in `config.root`, storing objects on disk.
    ///
    /// The root must be missing or empty. On failure, directories created
    /// here are removed again.
    pub fn create(config: NodeConfig, transport: Arc<dyn Transport>) -> NodeResult<Self> {
        Self::create_inner(config, transport, None)
    }

    /// Like [`Node::create`] with a caller-provided object store.
    pub fn create_with_storage(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
    ) -> NodeResult<Self> {
        Self::create_inner(config, transport, Some(storage))
    }

    fn create_inner(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        storage: Option<Arc<dyn Storage>>,
    ) -> NodeResult<Self> {
        config.validate()?;
        ensure_empty(&config.root)?;
        let layout = NodeLayout::new(&config.root);
        let created = layout.create()?;
        match Self::assemble(config, layout, transport, storage) {
            Ok(node) => {
                info!(root = %node.config.root.display(), "node created");
                Ok(node)
            }
            Err(e) => {
                NodeLayout::remove_created(&created);
                Err(e)
            }
        }
    }

    /// Open a node previously initialized with [`Node::create`].
    pub fn open(config: NodeConfig, transport: Arc<dyn Transport>) -> NodeResult<Self> {
        Self::open_inner(config, transport, None)
    }

    /// Like [`Node::open`] with a caller-provided object store.
    pub fn open_with_storage(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
    ) -> NodeResult<Self> {
        Self::open_inner(config, transport, Some(storage))
    }

    fn open_inner(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        storage: Option<Arc<dyn Storage>>,
    ) -> NodeResult<Self> {
        config.validate()?;
        let layout = NodeLayout::new(&config.root);
        if !layout.is_complete() {
            return Err(NodeError::NotInitialized(config.root.clone()));
        }
        let node = Self::assemble(config, layout, transport, storage)?;
        info!(root = %node.config.root.display(), "node opened");
        Ok(node)
    }

    fn assemble(
        config: NodeConfig,
        layout: NodeLayout,
        transport: Arc<dyn Transport>,
        storage: Option<Arc<dyn Storage>>,
    ) -> NodeResult<Self> {
        let storage: Arc<dyn Storage> = match storage {
            Some(s) => s,
            None => Arc::new(DirectoryStorage::for_layout(&layout)?),
        };
        let engine = SyncEngine::new(config.sync_config()?, layout, storage, transport.clone());
        Ok(Self {
            config,
            engine: Arc::new(engine),
            transport,
            reconnect: None,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn layout(&self) -> &NodeLayout {
        self.engine.layout()
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Event sink to register with the transport.
    pub fn events(&self) -> Arc<dyn TransportEvents> {
        self.engine.clone()
    }

    pub fn is_running(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Start the reconnection loop. Must be called inside a tokio runtime.
    /// Starting a running node does nothing.
    pub fn start(&mut self) {
        if self.reconnect.is_some() {
            warn!("node already started");
            return;
        }
        let peers = Arc::new(PeerDirectory::new(self.engine.layout()));
        let handle =
            ReconnectLoop::new(peers, self.transport.clone(), self.config.reconnect_interval())
                .spawn();
        self.reconnect = Some(handle);
        info!(root = %self.config.root.display(), "node started");
    }

    /// Stop the reconnection loop, wait for it to exit, then close the
    /// transport. In-flight file transfers are left to the transport.
    ///
    /// A loop that died on its own is logged; the transport is closed either
    /// way.
    pub async fn shutdown(mut self) -> NodeResult<()> {
        if let Some(handle) = self.reconnect.take() {
            if let Err(e) = handle.stop().await {
                error!(error = %e, "reconnect loop ended abnormally");
            }
        }
        self.transport.close().await?;
        info!(root = %self.config.root.display(), "node stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("root", &self.config.root)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Fail unless `root` is missing or an empty directory.
fn ensure_empty(root: &Path) -> NodeResult<()> {
    let mut entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if entries.next().is_some() {
        return Err(NodeError::NotEmpty(root.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypta_store::InMemoryStorage;
    use crypta_sync::testing::RecordingTransport;
    use crypta_sync::{CompletionReceiver, SyncResult};
    use crypta_types::{PeerAddress, PeerRecord};

    fn transport() -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport::new(PeerAddress::new("self").unwrap()))
    }

    #[test]
    fn create_builds_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("node");
        let node = Node::create(NodeConfig::new(&root), transport()).unwrap();
        assert!(node.layout().is_complete());
        assert!(!node.is_running());
    }

    #[test]
    fn create_accepts_empty_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        Node::create(NodeConfig::new(dir.path()), transport()).unwrap();
        assert!(NodeLayout::new(dir.path()).is_complete());
    }

    #[test]
    fn create_refuses_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stray"), b"x").unwrap();
        let err = Node::create(NodeConfig::new(dir.path()), transport()).unwrap_err();
        assert!(matches!(err, NodeError::NotEmpty(_)));
        assert!(!dir.path().join("objects").exists());
    }

    #[test]
    fn create_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("node");
        let mut config = NodeConfig::new(&root);
        config.bootstrap_address = Some(String::new());
        assert!(Node::create(config, transport()).is_err());
        assert!(!root.exists());
    }

    #[test]
    fn open_requires_layout() {
        let dir = tempfile::tempdir().unwrap();
        let err = Node::open(NodeConfig::new(dir.path()), transport()).unwrap_err();
        assert!(matches!(err, NodeError::NotInitialized(_)));

        Node::create(NodeConfig::new(dir.path()), transport()).unwrap();
        let storage = Arc::new(InMemoryStorage::new());
        Node::open_with_storage(NodeConfig::new(dir.path()), transport(), storage).unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_loop_then_closes_transport() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport();
        let mut node = Node::create(NodeConfig::new(dir.path().join("n")), t.clone()).unwrap();
        node.start();
        node.start();
        assert!(node.is_running());
        assert!(!t.is_closed());
        node.shutdown().await.unwrap();
        assert!(t.is_closed());
    }

    /// Delegates to a [`RecordingTransport`] but panics on connect.
    struct PanicOnConnect(RecordingTransport);

    #[async_trait::async_trait]
    impl Transport for PanicOnConnect {
        async fn send(&self, address: &PeerAddress, payload: Vec<u8>) -> SyncResult<()> {
            self.0.send(address, payload).await
        }

        async fn send_file(
            &self,
            address: &PeerAddress,
            path: &Path,
            identification: &str,
        ) -> SyncResult<CompletionReceiver> {
            self.0.send_file(address, path, identification).await
        }

        async fn accept_connection(&self, _address: &PeerAddress) -> SyncResult<()> {
            panic!("connect exploded");
        }

        fn address(&self) -> SyncResult<PeerAddress> {
            self.0.address()
        }

        async fn close(&self) -> SyncResult<()> {
            self.0.close().await
        }
    }

    #[tokio::test]
    async fn shutdown_closes_transport_after_loop_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let t = Arc::new(PanicOnConnect(RecordingTransport::new(
            PeerAddress::new("self").unwrap(),
        )));
        let mut node = Node::create(NodeConfig::new(dir.path().join("n")), t.clone()).unwrap();
        let record = PeerRecord::new(PeerAddress::new("peer-a").unwrap(), "a", true);
        PeerDirectory::new(node.layout()).save("a", &record).unwrap();

        node.start();
        for _ in 0..100 {
            if node.reconnect.as_ref().is_some_and(|h| h.is_finished()) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(node.reconnect.as_ref().is_some_and(|h| h.is_finished()));

        node.shutdown().await.unwrap();
        assert!(t.0.is_closed());
    }

    #[tokio::test]
    async fn shutdown_without_start_closes_transport() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport();
        let node = Node::create(NodeConfig::new(dir.path().join("n")), t.clone()).unwrap();
        node.shutdown().await.unwrap();
        assert!(t.is_closed());
    }
}
