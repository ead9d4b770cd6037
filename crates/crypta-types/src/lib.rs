//! Foundation types for Crypta, an encrypted storage peer.
//!
//! A Crypta node holds encrypted content on behalf of a synchronization
//! network. It never interprets that content; it only grants one remote peer
//! at a time a window in which objects may be pulled or pushed.
//!
//! # Key Types
//!
//! - [`PeerAddress`]: Transport-level address of a remote peer
//! - [`ObjectType`]: Classification controlling where an object is stored
//! - [`PeerRecord`]: Persisted description of a known peer

pub mod address;
pub mod error;
pub mod object;
pub mod peer;

pub use address::PeerAddress;
pub use error::TypeError;
pub use object::ObjectType;
pub use peer::PeerRecord;
