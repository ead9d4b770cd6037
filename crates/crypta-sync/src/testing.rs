//! In-process [`Transport`] for tests.
//!
//! Records every message, file hand-off and connection attempt instead of
//! touching a network. File sends stay pending until the test resolves them
//! with [`RecordingTransport::complete_file`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use crypta_protocol::{Message, MessageCodec};
use crypta_types::PeerAddress;
use tokio::sync::oneshot;

use crate::error::{SyncError, SyncResult};
use crate::transport::{CompletionReceiver, TransferStatus, Transport};

/// A file handed to [`Transport::send_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentFile {
    pub address: PeerAddress,
    pub path: PathBuf,
    pub identification: String,
    /// Contents at hand-off time.
    pub contents: Vec<u8>,
}

#[derive(Default)]
struct Recorded {
    messages: Vec<(PeerAddress, Vec<u8>)>,
    files: Vec<SentFile>,
    completions: Vec<Option<oneshot::Sender<TransferStatus>>>,
    connections: Vec<PeerAddress>,
}

#[derive(Default)]
pub struct RecordingTransport {
    own: Option<PeerAddress>,
    recorded: Mutex<Recorded>,
    unreachable: Mutex<HashSet<PeerAddress>>,
    fail_send_file: AtomicBool,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new(own: PeerAddress) -> Self {
        Self {
            own: Some(own),
            ..Self::default()
        }
    }

    /// A transport that cannot report its own address.
    pub fn without_address() -> Self {
        Self::default()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every payload sent, in order.
    pub fn raw_messages(&self) -> Vec<(PeerAddress, Vec<u8>)> {
        self.recorded().messages.clone()
    }

    /// Decoded messages sent to `address`, in order. Undecodable payloads
    /// are skipped.
    pub fn messages_to(&self, address: &PeerAddress) -> Vec<Message> {
        self.recorded()
            .messages
            .iter()
            .filter(|(a, _)| a == address)
            .filter_map(|(_, p)| MessageCodec::decode(p).ok())
            .collect()
    }

    pub fn files(&self) -> Vec<SentFile> {
        self.recorded().files.clone()
    }

    /// Resolve the completion of the `index`-th file send.
    /// Returns `false` if it was already resolved or does not exist.
    pub fn complete_file(&self, index: usize, status: TransferStatus) -> bool {
        let sender = self
            .recorded()
            .completions
            .get_mut(index)
            .and_then(Option::take);
        match sender {
            Some(tx) => tx.send(status).is_ok(),
            None => false,
        }
    }

    /// Addresses passed to `accept_connection`, in order.
    pub fn connections(&self) -> Vec<PeerAddress> {
        self.recorded().connections.clone()
    }

    /// Make `accept_connection` fail for `address`.
    pub fn set_unreachable(&self, address: PeerAddress) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address);
    }

    pub fn set_fail_send_file(&self, fail: bool) {
        self.fail_send_file.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Forget everything recorded so far. Pending completions are dropped.
    pub fn reset(&self) {
        *self.recorded() = Recorded::default();
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.is_closed() {
            return Err(SyncError::Transport("transport closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, address: &PeerAddress, payload: Vec<u8>) -> SyncResult<()> {
        self.ensure_open()?;
        self.recorded().messages.push((address.clone(), payload));
        Ok(())
    }

    async fn send_file(
        &self,
        address: &PeerAddress,
        path: &Path,
        identification: &str,
    ) -> SyncResult<CompletionReceiver> {
        self.ensure_open()?;
        if self.fail_send_file.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("send_file refused".into()));
        }
        let contents = tokio::fs::read(path).await?;
        let (tx, rx) = oneshot::channel();
        let mut recorded = self.recorded();
        recorded.files.push(SentFile {
            address: address.clone(),
            path: path.to_path_buf(),
            identification: identification.to_string(),
            contents,
        });
        recorded.completions.push(Some(tx));
        Ok(rx)
    }

    async fn accept_connection(&self, address: &PeerAddress) -> SyncResult<()> {
        self.ensure_open()?;
        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(address);
        if unreachable {
            return Err(SyncError::Transport(format!("{} unreachable", address.short())));
        }
        self.recorded().connections.push(address.clone());
        Ok(())
    }

    fn address(&self) -> SyncResult<PeerAddress> {
        self.own
            .clone()
            .ok_or_else(|| SyncError::Transport("no local address".into()))
    }

    async fn close(&self) -> SyncResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
