use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::sample::{decode_ledger, encode_ledger, LocationSample};
use crate::store::{DurableStore, StoreError};

#[derive(Debug, Clone, Copy)]
enum Op {
    Read,
    Write,
    Delete,
}

#[derive(Debug, Default)]
struct Faults {
    reads: usize,
    writes: usize,
    deletes: usize,
    stall: Option<Duration>,
}

/// In-process store that keeps the encoded ledger bytes per key.
///
/// Faults can be injected to exercise the buffer's failure paths: the next
/// `n` reads/writes/deletes fail, or every call stalls before running.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    faults: Mutex<Faults>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_reads(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.reads = count;
        }
    }

    pub fn fail_next_writes(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.writes = count;
        }
    }

    pub fn fail_next_deletes(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.deletes = count;
        }
    }

    /// Delays every subsequent call by `delay`; `None` removes the stall.
    pub fn stall(&self, delay: Option<Duration>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.stall = delay;
        }
    }

    /// Number of writes that reached the map.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Encoded bytes stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(key).cloned())
    }

    async fn pre_call(&self, op: Op) -> Result<(), StoreError> {
        let (stall, fail) = {
            let mut faults = self
                .faults
                .lock()
                .map_err(|_| StoreError::Unavailable("fault table poisoned".into()))?;
            let stall = faults.stall;
            let remaining = match op {
                Op::Read => &mut faults.reads,
                Op::Write => &mut faults.writes,
                Op::Delete => &mut faults.deletes,
            };
            let fail = *remaining > 0;
            if fail {
                *remaining -= 1;
            }
            (stall, fail)
        };

        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Unavailable(format!("injected {:?} failure", op)));
        }
        Ok(())
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<LocationSample>>, StoreError> {
        self.pre_call(Op::Read).await?;
        let bytes = self.records()?.get(key).cloned();
        bytes.map(|bytes| decode_ledger(&bytes)).transpose()
    }

    async fn write(&self, key: &str, samples: &[LocationSample]) -> Result<(), StoreError> {
        self.pre_call(Op::Write).await?;
        let bytes = encode_ledger(samples)?;
        self.records()?.insert(key.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.pre_call(Op::Delete).await?;
        self.records()?.remove(key);
        Ok(())
    }
}
