use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("empty peer address")]
    EmptyAddress,

    #[error("unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
