//! A Crypta node: one peer of the encrypted synchronization network.
//!
//! This crate wires the [`crypta_sync`] engine to a node root on disk and
//! owns its lifecycle: configuration loading, directory setup, the
//! background reconnection loop, and orderly shutdown.

pub mod config;
pub mod error;
pub mod node;
pub mod telemetry;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::Node;
pub use telemetry::init_tracing;
