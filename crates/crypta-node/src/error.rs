use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("node root is not empty: {0}")]
    NotEmpty(PathBuf),

    #[error("no node found at {0}")]
    NotInitialized(PathBuf),

    #[error("tracing setup failed: {0}")]
    Telemetry(String),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("store error: {0}")]
    Store(#[from] crypta_store::StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] crypta_sync::SyncError),

    #[error("type error: {0}")]
    Type(#[from] crypta_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NodeResult<T> = Result<T, NodeError>;
