//! Synchronization engine for a Crypta node.
//!
//! A node grants exactly one remote peer at a time an exclusive window in
//! which it may pull objects from (`request`) or push objects to (`push`)
//! this node. The engine is made of:
//!
//! - [`LockManager`]: the single mutual-exclusion slot with sliding expiry
//! - [`TransferTable`]: which inbound files a peer may deliver, and where
//! - [`SyncEngine`]: message dispatch and file-transfer callbacks
//! - [`ReconnectLoop`]: background re-connection to trusted peers
//!
//! The transport is abstracted behind [`Transport`]; the engine implements
//! [`TransportEvents`] for the transport to call back into.

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod reconnect;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transfer;
pub mod transport;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use lock::{Acquisition, LockManager, LockSnapshot, DEFAULT_LOCK_TIMEOUT};
pub use reconnect::{
    PeerSource, ReconnectHandle, ReconnectLoop, TickReport, DEFAULT_RECONNECT_INTERVAL,
    MAX_RECONNECT_INTERVAL, MIN_RECONNECT_INTERVAL,
};
pub use transfer::{PendingTransfer, TransferKey, TransferTable};
pub use transport::{CompletionReceiver, TransferStatus, Transport, TransportEvents};
