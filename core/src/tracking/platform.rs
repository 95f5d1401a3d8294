//! Interface to the platform location service.
//!
//! The platform owns permission prompts and the background delivery
//! mechanism. It pushes batches of raw fixes into the [`DeliverySink`] it was
//! handed at subscribe time; the core never polls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::prelude::PermissionScope;
use crate::sample::RawLocationUpdate;

#[derive(thiserror::Error, Debug)]
pub enum PlatformError {
    #[error("location service unavailable: {0}")]
    Unavailable(String),
    #[error("location service rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    Lowest,
    Low,
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Other,
    AutomotiveNavigation,
    Fitness,
    OtherNavigation,
    Airborne,
}

/// Persistent notification shown while the foreground service runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForegroundNotice {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub accuracy: AccuracyTier,
    pub min_time_interval_ms: u64,
    pub min_distance_meters: f64,
    pub pause_when_stationary: bool,
    pub activity: ActivityType,
    pub show_background_indicator: bool,
    pub foreground_notice: ForegroundNotice,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::High,
            min_time_interval_ms: 3_000,
            min_distance_meters: 5.0,
            pause_when_stationary: true,
            activity: ActivityType::Fitness,
            show_background_indicator: true,
            foreground_notice: ForegroundNotice {
                title: "WorldPaint".to_string(),
                body: "Recording your activity…".to_string(),
            },
        }
    }
}

/// One invocation of the background delivery handler.
#[derive(Debug, Clone)]
pub enum Delivery {
    Locations(Vec<RawLocationUpdate>),
    /// The platform reported an error instead of data.
    Failed(String),
}

/// Handle the platform uses to push deliveries to the registered handler.
#[derive(Debug, Clone)]
pub struct DeliverySink {
    tx: mpsc::Sender<Delivery>,
}

impl DeliverySink {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Waits for room in the handler queue; fails once the handler is gone.
    pub async fn deliver(&self, updates: Vec<RawLocationUpdate>) -> Result<(), PlatformError> {
        self.send(Delivery::Locations(updates)).await
    }

    pub async fn report_error(&self, message: impl Into<String>) -> Result<(), PlatformError> {
        self.send(Delivery::Failed(message.into())).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, delivery: Delivery) -> Result<(), PlatformError> {
        self.tx
            .send(delivery)
            .await
            .map_err(|_| PlatformError::Unavailable("delivery handler is not registered".into()))
    }
}

#[async_trait]
pub trait LocationPlatform: Send + Sync {
    async fn request_permission(
        &self,
        scope: PermissionScope,
    ) -> Result<PermissionStatus, PlatformError>;

    /// Whether a background subscription is currently registered.
    async fn is_subscribed(&self) -> Result<bool, PlatformError>;

    async fn subscribe(
        &self,
        config: &SubscriptionConfig,
        sink: DeliverySink,
    ) -> Result<(), PlatformError>;

    async fn unsubscribe(&self) -> Result<(), PlatformError>;
}
