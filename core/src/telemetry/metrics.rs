use serde::Serialize;
use std::sync::Mutex;

/// Counters for the capture pipeline.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub samples_received: usize,
    pub samples_persisted: usize,
    pub samples_dropped: usize,
    pub flushes: usize,
    pub flush_failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_received(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.samples_received += count;
        }
    }

    pub fn record_flush(&self, persisted: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.flushes += 1;
            metrics.samples_persisted += persisted;
        }
    }

    pub fn record_flush_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.flush_failures += 1;
        }
    }

    pub fn record_dropped(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.samples_dropped += count;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
