use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no transfer permission for {0}")]
    NoPermission(String),

    #[error("the model cannot be removed remotely")]
    ModelRemoval,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("store error: {0}")]
    Store(#[from] crypta_store::StoreError),

    #[error("protocol error: {0}")]
    Protocol(#[from] crypta_protocol::ProtocolError),

    #[error("type error: {0}")]
    Type(#[from] crypta_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
