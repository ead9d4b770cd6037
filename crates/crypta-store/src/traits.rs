use crate::error::StoreResult;

/// Narrow key/value interface the sync core stores objects through.
///
/// Implementations must be thread-safe: inbound file completions and
/// message handlers call into the store concurrently.
pub trait Storage: Send + Sync {
    /// Write `data` under `key`, replacing any previous content.
    fn store(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Read the content stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Remove `key`. Returns `true` if it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Check whether `key` exists.
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.retrieve(key)?.is_some())
    }
}
