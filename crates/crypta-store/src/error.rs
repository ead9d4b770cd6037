use crypta_types::{ObjectType, TypeError};

/// Errors from storage and layout operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key or file was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A key or identification cannot be mapped onto the filesystem safely.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The object type is not backed by a well-known file.
    #[error("object type {0} has no well-known file")]
    NotWellKnown(ObjectType),

    /// The node layout is missing or incomplete.
    #[error("layout missing at {0}")]
    LayoutMissing(String),

    /// Persisted record could not be decoded.
    #[error("record error: {0}")]
    Record(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
