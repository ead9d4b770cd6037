//! Wire protocol for Crypta.
//!
//! Nodes exchange JSON objects tagged by a `type` field. Four message kinds
//! make up the protocol:
//!
//! - `lock` negotiates the exclusive sync window
//! - `request` pulls an object
//! - `push` announces an object the sender wants to deliver
//! - `notify` reports a missing or removed object

pub mod codec;
pub mod error;
pub mod message;

pub use codec::MessageCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{LockAction, Message, NotifyKind, MAX_MESSAGE_SIZE};
