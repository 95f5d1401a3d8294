pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::sample::LocationSample;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for the sample ledger.
///
/// A `write` is either fully visible to the next `read` or not at all.
/// Callers never issue concurrent writes to the same key.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns `None` when nothing has been stored under `key`.
    async fn read(&self, key: &str) -> Result<Option<Vec<LocationSample>>, StoreError>;
    async fn write(&self, key: &str, samples: &[LocationSample]) -> Result<(), StoreError>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
