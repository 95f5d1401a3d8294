use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::store::StoreError;
use crate::tracking::platform::PlatformError;

/// Persist after this many pending samples.
pub const BATCH_SIZE: usize = 10;
/// Or once this much time has passed since the last successful flush.
pub const BATCH_TIME_MS: u64 = 30_000;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LEDGER_KEY: &str = "@worldpaint:location_buffer";

/// Batching and persistence settings shared by the buffer and controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub batch_size: usize,
    pub batch_time_ms: u64,
    /// Upper bound on unflushed samples. `None` keeps every sample while the
    /// store is failing; `Some(n)` drops the oldest beyond `n`.
    pub max_pending: Option<usize>,
    pub store_timeout_ms: u64,
    pub ledger_key: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            batch_time_ms: BATCH_TIME_MS,
            max_pending: None,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            ledger_key: DEFAULT_LEDGER_KEY.to_string(),
        }
    }
}

impl BufferConfig {
    pub fn batch_time(&self) -> Duration {
        Duration::from_millis(self.batch_time_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Which of the two platform grants was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionScope {
    Foreground,
    Background,
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionScope::Foreground => write!(f, "foreground"),
            PermissionScope::Background => write!(f, "background"),
        }
    }
}

/// Common error type for tracking and persistence operations.
#[derive(thiserror::Error, Debug)]
pub enum TrackingError {
    #[error("{0} location permission denied")]
    PermissionDenied(PermissionScope),
    #[error("subscription failure: {0}")]
    Subscription(#[source] PlatformError),
    #[error("store read failure: {0}")]
    StoreRead(#[source] StoreError),
    #[error("store write failure: {0}")]
    StoreWrite(#[source] StoreError),
}

impl TrackingError {
    /// Permission refusals need user action; everything else may succeed on
    /// the next start/stop or flush.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TrackingError::PermissionDenied(_))
    }
}

pub type TrackingResult<T> = Result<T, TrackingError>;
