use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crypta_types::PeerAddress;
use tokio::sync::oneshot;

use crate::error::SyncResult;

/// Final state of a file hand-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Success,
    Failed,
    Canceled,
}

/// Resolves once the transport finished (or gave up on) a file send.
pub type CompletionReceiver = oneshot::Receiver<TransferStatus>;

/// Encrypted point-to-point channel to other peers.
///
/// Implemented by the transport collaborator; the engine only ever talks
/// to peers through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a protocol message.
    async fn send(&self, address: &PeerAddress, payload: Vec<u8>) -> SyncResult<()>;

    /// Hand off a file for asynchronous sending.
    ///
    /// Returns as soon as the transfer is queued. The receiver resolves when
    /// it finishes; a dropped sender counts as failure.
    async fn send_file(
        &self,
        address: &PeerAddress,
        path: &Path,
        identification: &str,
    ) -> SyncResult<CompletionReceiver>;

    /// Ensure a connection to `address` exists. Must be idempotent.
    async fn accept_connection(&self, address: &PeerAddress) -> SyncResult<()>;

    /// This node's own address.
    fn address(&self) -> SyncResult<PeerAddress>;

    async fn close(&self) -> SyncResult<()>;
}

/// Inbound events the transport delivers to the node.
///
/// Callbacks never fail towards the transport: errors are logged by the
/// implementor. Events may arrive concurrently.
#[async_trait]
pub trait TransportEvents: Send + Sync {
    /// A peer asked to connect. Returns whether to accept.
    fn on_connection_request(&self, address: &PeerAddress, message: &str) -> bool;

    /// A protocol message arrived.
    async fn on_message(&self, address: &PeerAddress, payload: &[u8]);

    /// A peer offers a file. Returns the staging path to write it to, or
    /// `None` to refuse. Called before any bytes are accepted.
    fn on_file_offered(&self, address: &PeerAddress, identification: &str) -> Option<PathBuf>;

    /// An accepted file was fully written to `staging_path`.
    async fn on_file_received(&self, address: &PeerAddress, staging_path: &Path, identification: &str);

    /// An accepted file transfer was aborted.
    async fn on_file_canceled(&self, address: &PeerAddress, staging_path: &Path);

    /// A peer came online.
    fn on_connected(&self, address: &PeerAddress);
}
