//! Message dispatch and file-transfer callbacks.
//!
//! | message         | precondition              |
//! |-----------------|---------------------------|
//! | lock / request  | none                      |
//! | lock / release  | sender is the holder      |
//! | request         | sender refreshes the lock |
//! | push            | sender refreshes the lock |
//! | notify/missing  | none                      |
//! | notify/removed  | sender refreshes the lock |
//!
//! The protocol is pull based: a `push` only announces an object, and the
//! node answers with a `request` for it. Bytes flow through the transport's
//! file channel, never inside messages.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use crypta_protocol::{LockAction, Message, MessageCodec, NotifyKind};
use crypta_store::{NodeLayout, Storage};
use crypta_types::{ObjectType, PeerAddress};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::lock::{Acquisition, LockManager};
use crate::transfer::{PendingTransfer, TransferKey, TransferTable};
use crate::transport::{TransferStatus, Transport, TransportEvents};

pub struct SyncEngine {
    config: SyncConfig,
    layout: NodeLayout,
    lock: LockManager,
    transfers: TransferTable,
    storage: Arc<dyn Storage>,
    transport: Arc<dyn Transport>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        layout: NodeLayout,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let lock = LockManager::new(config.lock_timeout);
        let transfers = TransferTable::new(layout.receiving_dir());
        Self {
            config,
            layout,
            lock,
            transfers,
            storage,
            transport,
        }
    }

    pub fn lock(&self) -> &LockManager {
        &self.lock
    }

    pub fn transfers(&self) -> &TransferTable {
        &self.transfers
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Clear the lock whoever holds it and drop that peer's permissions.
    pub fn force_clear(&self) -> Option<PeerAddress> {
        let holder = self.lock.clear()?;
        self.end_session(&holder);
        info!(peer = %holder.short(), "sync lock force-cleared");
        Some(holder)
    }

    /// Clear a stale lock, if any, and drop its holder's permissions.
    pub fn expire_stale_lock(&self) -> Option<PeerAddress> {
        let expired = self.lock.check_and_expire()?;
        self.end_session(&expired);
        Some(expired)
    }

    fn end_session(&self, address: &PeerAddress) {
        self.transfers.purge_by_address(address);
    }

    /// Parse and route one inbound payload.
    pub async fn handle_payload(&self, address: &PeerAddress, payload: &[u8]) {
        match MessageCodec::decode(payload) {
            Ok(msg) => self.dispatch(address, msg).await,
            Err(e) => {
                warn!(peer = %address.short(), error = %e, "dropping unparseable message");
                if self.config.echo_unparseable {
                    if let Err(e) = self.transport.send(address, payload.to_vec()).await {
                        warn!(peer = %address.short(), error = %e, "echo failed");
                    }
                }
            }
        }
    }

    /// Route one decoded message to its handler.
    pub async fn dispatch(&self, address: &PeerAddress, msg: Message) {
        debug!(peer = %address.short(), kind = msg.type_name(), "message received");
        match msg {
            Message::Lock { action } => self.handle_lock(address, action).await,
            Message::Request {
                obj_type,
                identification,
            } => {
                if self.holder_gate(address, "request") {
                    self.handle_request(address, obj_type, &identification).await;
                }
            }
            Message::Push {
                obj_type,
                identification,
                name,
            } => {
                if self.holder_gate(address, "push") {
                    self.handle_push(address, obj_type, &identification, name).await;
                }
            }
            Message::Notify {
                notify,
                identification,
                obj_type,
            } => self.handle_notify(address, notify, obj_type, &identification),
        }
    }

    /// Refresh the lock for `address`; log and refuse if it is not the holder.
    fn holder_gate(&self, address: &PeerAddress, kind: &str) -> bool {
        if self.lock.refresh(address) {
            return true;
        }
        warn!(peer = %address.short(), kind, "message from peer without the sync lock dropped");
        false
    }

    async fn reply(&self, address: &PeerAddress, msg: Message) {
        let payload = match MessageCodec::encode(&msg) {
            Ok(p) => p,
            Err(e) => {
                error!(kind = msg.type_name(), error = %e, "failed to encode reply");
                return;
            }
        };
        if let Err(e) = self.transport.send(address, payload).await {
            warn!(peer = %address.short(), kind = msg.type_name(), error = %e, "failed to send reply");
        }
    }

    async fn handle_lock(&self, address: &PeerAddress, action: LockAction) {
        match action {
            LockAction::Request => {
                if self.lock.is_holder(address) {
                    // Peers must not run two syncs at once.
                    debug!(peer = %address.short(), "duplicate lock request ignored");
                    return;
                }
                match self.lock.try_set_lock(address) {
                    Acquisition::Granted { expired, .. } => {
                        if let Some(previous) = expired {
                            self.end_session(&previous);
                        }
                        self.reply(address, Message::lock(LockAction::Accept)).await;
                    }
                    Acquisition::Denied { holder } => {
                        info!(
                            peer = %address.short(),
                            holder = %holder.short(),
                            "sync lock denied"
                        );
                        // Explicit deny so the peer does not wait on silence.
                        self.reply(address, Message::lock(LockAction::Release)).await;
                    }
                }
            }
            LockAction::Release => {
                if self.lock.release(address) {
                    self.end_session(address);
                    info!(peer = %address.short(), "sync lock released by holder");
                } else {
                    warn!(peer = %address.short(), "release from peer that does not hold the lock ignored");
                }
            }
            LockAction::Accept => {
                warn!(peer = %address.short(), "unexpected lock accept ignored");
            }
        }
    }

    fn load_outbound(&self, obj_type: ObjectType, identification: &str) -> SyncResult<Option<Vec<u8>>> {
        let data = match obj_type {
            ObjectType::Object => self.storage.retrieve(identification)?,
            _ => self.layout.read_well_known(obj_type, identification)?,
        };
        Ok(data)
    }

    async fn handle_request(&self, address: &PeerAddress, obj_type: ObjectType, identification: &str) {
        let data = match self.load_outbound(obj_type, identification) {
            Ok(Some(data)) => data,
            Ok(None) => {
                // A missing model just means this node is still empty.
                if obj_type == ObjectType::Model {
                    debug!(peer = %address.short(), "model requested but not present");
                } else {
                    warn!(peer = %address.short(), %obj_type, identification, "requested object missing");
                }
                self.reply_missing(address, obj_type, identification).await;
                return;
            }
            Err(e) => {
                warn!(peer = %address.short(), %obj_type, identification, error = %e, "retrieval failed");
                self.reply_missing(address, obj_type, identification).await;
                return;
            }
        };

        let path = self.layout.sending_dir().join(outbound_staging_name(address, identification));
        if let Err(e) = tokio::fs::write(&path, &data).await {
            error!(path = %path.display(), error = %e, "failed to stage outbound file");
            return;
        }

        let completion = match self.transport.send_file(address, &path, identification).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(peer = %address.short(), identification, error = %e, "file hand-off failed");
                remove_staging(&path).await;
                return;
            }
        };
        debug!(peer = %address.short(), identification, bytes = data.len(), "file send started");

        let peer = address.short().to_string();
        tokio::spawn(async move {
            match completion.await {
                Ok(TransferStatus::Success) => remove_staging(&path).await,
                Ok(status) => {
                    warn!(%peer, path = %path.display(), ?status, "file send did not complete; staging file kept");
                }
                Err(_) => {
                    warn!(%peer, path = %path.display(), "file send abandoned; staging file kept");
                }
            }
        });
    }

    async fn reply_missing(&self, address: &PeerAddress, obj_type: ObjectType, identification: &str) {
        let msg = Message::notify(NotifyKind::Missing, identification, obj_type);
        self.reply(address, msg).await;
    }

    async fn handle_push(
        &self,
        address: &PeerAddress,
        obj_type: ObjectType,
        identification: &str,
        name: Option<String>,
    ) {
        self.transfers.allow(address, obj_type, identification, name);
        self.reply(address, Message::request(obj_type, identification)).await;
    }

    fn handle_notify(
        &self,
        address: &PeerAddress,
        notify: NotifyKind,
        obj_type: ObjectType,
        identification: &str,
    ) {
        match notify {
            NotifyKind::Missing => {
                info!(peer = %address.short(), %obj_type, identification, "peer reports object missing");
            }
            NotifyKind::Removed => {
                if !self.holder_gate(address, "notify") {
                    return;
                }
                match self.remove_object(obj_type, identification) {
                    Ok(true) => {
                        debug!(peer = %address.short(), %obj_type, identification, "object removed");
                    }
                    Ok(false) => {
                        debug!(%obj_type, identification, "object to remove was already absent");
                    }
                    Err(e) => {
                        error!(%obj_type, identification, error = %e, "failed to remove object");
                    }
                }
            }
        }
    }

    fn remove_object(&self, obj_type: ObjectType, identification: &str) -> SyncResult<bool> {
        match obj_type {
            ObjectType::Object => Ok(self.storage.remove(identification)?),
            ObjectType::Peer | ObjectType::Auth => {
                Ok(self.layout.remove_well_known(obj_type, identification)?)
            }
            ObjectType::Model => Err(SyncError::ModelRemoval),
        }
    }

    fn commit_inbound(&self, pending: &PendingTransfer, data: &[u8]) -> SyncResult<()> {
        match pending.obj_type {
            ObjectType::Object => self.storage.store(&pending.identification, data)?,
            kind => self
                .layout
                .write_well_known(kind, &pending.identification, data)?,
        }
        Ok(())
    }

    async fn receive_file(
        &self,
        address: &PeerAddress,
        staging_path: &Path,
        identification: &str,
    ) -> SyncResult<PendingTransfer> {
        let (key, pending) = self
            .transfers
            .consume_staged(address, staging_path)
            .ok_or_else(|| {
                SyncError::NoPermission(TransferKey::new(address, identification).to_string())
            })?;
        if key.identification != identification {
            return Err(SyncError::NoPermission(format!(
                "{key} delivered as {identification}"
            )));
        }
        let data = tokio::fs::read(staging_path).await?;
        self.commit_inbound(&pending, &data)?;
        Ok(pending)
    }
}

#[async_trait]
impl TransportEvents for SyncEngine {
    fn on_connection_request(&self, address: &PeerAddress, _message: &str) -> bool {
        if self.config.bootstrap_address.as_ref() == Some(address) {
            info!(peer = %address.short(), "accepting connection from bootstrap address");
            return true;
        }
        info!(peer = %address.short(), "connection request refused");
        false
    }

    async fn on_message(&self, address: &PeerAddress, payload: &[u8]) {
        self.handle_payload(address, payload).await;
    }

    fn on_file_offered(&self, address: &PeerAddress, identification: &str) -> Option<PathBuf> {
        if !self.holder_gate(address, "file") {
            return None;
        }
        let path = self.transfers.accept(address, identification);
        if path.is_none() {
            warn!(peer = %address.short(), identification, "file offered without permission refused");
        }
        path
    }

    async fn on_file_received(&self, address: &PeerAddress, staging_path: &Path, identification: &str) {
        match self.receive_file(address, staging_path, identification).await {
            Ok(pending) => {
                debug!(
                    peer = %address.short(),
                    obj_type = %pending.obj_type,
                    identification,
                    "inbound file committed"
                );
            }
            Err(e) => {
                warn!(peer = %address.short(), identification, error = %e, "inbound file not committed");
            }
        }
        remove_staging(staging_path).await;
    }

    async fn on_file_canceled(&self, address: &PeerAddress, staging_path: &Path) {
        remove_staging(staging_path).await;
        match self.transfers.consume_staged(address, staging_path) {
            Some((key, _)) => info!(transfer = %key, "inbound transfer canceled"),
            None => debug!(peer = %address.short(), "canceled transfer had no permission entry"),
        }
    }

    fn on_connected(&self, address: &PeerAddress) {
        info!(peer = %address.short(), "peer connected");
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("root", &self.layout.root())
            .field("lock", &self.lock)
            .field("transfers", &self.transfers)
            .finish()
    }
}

/// Staging file name for one outbound send. Unique per send, so overlapping
/// requests for the same object never share a file.
fn outbound_staging_name(address: &PeerAddress, identification: &str) -> String {
    let key = TransferKey::new(address, identification);
    format!("{}-{}", key.staging_name(), Uuid::now_v7().simple())
}

/// Best-effort removal of a staging file.
async fn remove_staging(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staging file"),
    }
}
