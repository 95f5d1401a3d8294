use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use trackcore::sample::LocationSample;
use trackcore::store::{DurableStore, StoreError};

/// Number of ledger calls that fail before the real store is reached.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFaults {
    pub read_failures: usize,
    pub write_failures: usize,
}

impl StoreFaults {
    pub fn is_empty(&self) -> bool {
        self.read_failures == 0 && self.write_failures == 0
    }
}

/// Wraps a store and rejects its first reads/writes as configured.
pub struct FaultyStore {
    inner: Arc<dyn DurableStore>,
    reads_left: AtomicUsize,
    writes_left: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn DurableStore>, faults: StoreFaults) -> Self {
        Self {
            inner,
            reads_left: AtomicUsize::new(faults.read_failures),
            writes_left: AtomicUsize::new(faults.write_failures),
        }
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl DurableStore for FaultyStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<LocationSample>>, StoreError> {
        if take(&self.reads_left) {
            log::warn!("injected read failure for {}", key);
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, samples: &[LocationSample]) -> Result<(), StoreError> {
        if take(&self.writes_left) {
            log::warn!("injected write failure for {}", key);
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.inner.write(key, samples).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackcore::store::MemoryStore;

    #[tokio::test]
    async fn only_the_configured_writes_fail() {
        let faulty = FaultyStore::new(
            Arc::new(MemoryStore::new()),
            StoreFaults {
                read_failures: 0,
                write_failures: 2,
            },
        );
        let ledger = [LocationSample::new(1.0, 2.0, 3)];

        assert!(faulty.write("k", &ledger).await.is_err());
        assert!(faulty.write("k", &ledger).await.is_err());
        assert_eq!(faulty.read("k").await.unwrap(), None);
        faulty.write("k", &ledger).await.unwrap();
        assert_eq!(faulty.read("k").await.unwrap().unwrap().len(), 1);
    }
}
