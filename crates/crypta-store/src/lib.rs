//! Storage for a Crypta node.
//!
//! Two kinds of data live on a node:
//!
//! - Opaque objects, reachable through the [`Storage`] trait. The sync core
//!   never interprets them; keys are chosen by the higher sync layer.
//! - A handful of well-known files (model, per-peer identities, auth) whose
//!   paths are owned by [`NodeLayout`].
//!
//! # Storage Backends
//!
//! - [`InMemoryStorage`]: `HashMap`-based store for tests and embedding
//! - [`DirectoryStorage`]: one file per object under the node root
//!
//! # Design Rules
//!
//! 1. Writes replace the previous content of a key atomically (write to a
//!    temporary file, then rename).
//! 2. Object keys are hex-encoded and peer identifications validated before
//!    they become path components.
//! 3. All I/O errors are propagated to the caller.

pub mod directory;
pub mod error;
pub mod layout;
pub mod memory;
pub mod peers;
pub mod traits;

pub use directory::DirectoryStorage;
pub use error::{StoreError, StoreResult};
pub use layout::NodeLayout;
pub use memory::InMemoryStorage;
pub use peers::PeerDirectory;
pub use traits::Storage;
