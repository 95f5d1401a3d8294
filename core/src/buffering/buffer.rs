use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::prelude::{BufferConfig, TrackingError, TrackingResult};
use crate::sample::LocationSample;
use crate::store::{DurableStore, StoreError};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Result of a flush attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending, or no threshold was crossed.
    Skipped,
    /// `flushed` samples were appended; the ledger now holds `total`.
    Persisted { flushed: usize, total: usize },
}

/// In-memory accumulator in front of the durable ledger.
///
/// Samples stay in `pending` until a flush has written them. A failed flush
/// leaves `pending` untouched so the next attempt retries the same samples
/// plus whatever arrived since.
pub struct SampleBuffer {
    store: Arc<dyn DurableStore>,
    config: BufferConfig,
    pending: Vec<LocationSample>,
    last_flush_at: Instant,
    last_seen: Option<LocationSample>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl SampleBuffer {
    pub fn new(store: Arc<dyn DurableStore>, config: BufferConfig) -> Self {
        Self::with_metrics(store, config, Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(
        store: Arc<dyn DurableStore>,
        config: BufferConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            config,
            pending: Vec::new(),
            last_flush_at: Instant::now(),
            last_seen: None,
            metrics,
            logger: LogManager::new(),
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Samples received but not yet persisted, in arrival order.
    pub fn pending(&self) -> &[LocationSample] {
        &self.pending
    }

    pub fn last_flush_at(&self) -> Instant {
        self.last_flush_at
    }

    /// Most recent sample appended since creation or the last clear.
    pub fn last_seen(&self) -> Option<LocationSample> {
        self.last_seen
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    /// Queues `samples` in order, then flushes if a threshold is crossed.
    ///
    /// A store failure is returned, but the samples remain pending.
    pub async fn append<I>(&mut self, samples: I) -> TrackingResult<FlushOutcome>
    where
        I: IntoIterator<Item = LocationSample>,
    {
        let before = self.pending.len();
        self.pending.extend(samples);
        let received = self.pending.len() - before;
        if received > 0 {
            self.last_seen = self.pending.last().copied();
            self.metrics.record_received(received);
        }
        self.enforce_cap();
        self.maybe_flush().await
    }

    /// True once either the size or the age threshold has been reached.
    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.config.batch_size
            || self.last_flush_at.elapsed() >= self.config.batch_time()
    }

    /// When the age threshold will be reached, or `None` with nothing
    /// pending.
    pub fn flush_due(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.last_flush_at + self.config.batch_time())
        }
    }

    pub async fn maybe_flush(&mut self) -> TrackingResult<FlushOutcome> {
        if self.should_flush() {
            self.flush().await
        } else {
            Ok(FlushOutcome::Skipped)
        }
    }

    /// Appends everything pending to the durable ledger.
    ///
    /// Reads the current ledger, writes `existing ++ pending` back, and only
    /// then clears `pending`. An empty buffer never touches the store.
    pub async fn flush(&mut self) -> TrackingResult<FlushOutcome> {
        if self.pending.is_empty() {
            return Ok(FlushOutcome::Skipped);
        }

        match self.merge_pending().await {
            Ok(total) => {
                let flushed = self.pending.len();
                self.pending.clear();
                self.last_flush_at = Instant::now();
                self.metrics.record_flush(flushed);
                self.logger
                    .record(&format!("Persisted {} points. Total: {}", flushed, total));
                Ok(FlushOutcome::Persisted { flushed, total })
            }
            Err(err) => {
                self.metrics.record_flush_failure();
                self.logger.error(&format!(
                    "Failed to persist buffer ({} pending): {}",
                    self.pending.len(),
                    err
                ));
                Err(err)
            }
        }
    }

    async fn merge_pending(&self) -> TrackingResult<usize> {
        let limit = self.config.store_timeout();
        let key = self.config.ledger_key.as_str();

        let mut ledger = bounded(limit, self.store.read(key))
            .await
            .map_err(TrackingError::StoreRead)?
            .unwrap_or_default();
        ledger.extend_from_slice(&self.pending);

        match bounded(limit, self.store.write(key, &ledger)).await {
            Ok(()) => Ok(ledger.len()),
            Err(StoreError::Timeout(elapsed)) => {
                // The write may have committed before the deadline cut it off.
                let stored = bounded(limit, self.store.read(key)).await.ok().flatten();
                if stored.as_ref() == Some(&ledger) {
                    self.logger.warn(&format!(
                        "Ledger write timed out after {:?} but had committed",
                        elapsed
                    ));
                    Ok(ledger.len())
                } else {
                    Err(TrackingError::StoreWrite(StoreError::Timeout(elapsed)))
                }
            }
            Err(err) => Err(TrackingError::StoreWrite(err)),
        }
    }

    /// Size of the durable ledger. Pending samples are not counted.
    pub async fn count(&self) -> TrackingResult<usize> {
        let ledger = bounded(
            self.config.store_timeout(),
            self.store.read(&self.config.ledger_key),
        )
        .await
        .map_err(TrackingError::StoreRead)?;
        Ok(ledger.map(|samples| samples.len()).unwrap_or(0))
    }

    /// Erases the durable ledger and drops everything pending.
    pub async fn clear(&mut self) -> TrackingResult<()> {
        bounded(
            self.config.store_timeout(),
            self.store.delete(&self.config.ledger_key),
        )
        .await
        .map_err(TrackingError::StoreWrite)?;

        self.pending.clear();
        self.last_seen = None;
        self.last_flush_at = Instant::now();
        self.logger.record("Buffer cleared");
        Ok(())
    }

    fn enforce_cap(&mut self) {
        let Some(max) = self.config.max_pending else {
            return;
        };
        if self.pending.len() <= max {
            return;
        }
        let excess = self.pending.len() - max;
        self.pending.drain(..excess);
        self.metrics.record_dropped(excess);
        self.logger.warn(&format!(
            "Pending buffer over cap {}, dropped {} oldest samples",
            max, excess
        ));
    }
}

async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, op)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
