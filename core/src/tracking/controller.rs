use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::buffering::SampleBuffer;
use crate::prelude::{BufferConfig, PermissionScope, TrackingError, TrackingResult};
use crate::sample::LocationSample;
use crate::store::DurableStore;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use crate::tracking::platform::{
    DeliverySink, LocationPlatform, PermissionStatus, SubscriptionConfig,
};
use crate::tracking::pump::DeliveryPump;

const DELIVERY_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackingState {
    Idle,
    Tracking,
}

/// Snapshot handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityState {
    pub is_tracking: bool,
    pub buffer_count: usize,
    pub last_location: Option<LocationSample>,
}

/// Owns the delivery subscription and the sample buffer behind it.
///
/// `start`/`stop` return the underlying error; the `*_background_tracking`
/// and `get_buffer_count`/`clear_buffer` variants are the UI boundary and
/// only report success.
pub struct TrackingController {
    platform: Arc<dyn LocationPlatform>,
    buffer: Arc<Mutex<SampleBuffer>>,
    subscription: SubscriptionConfig,
    state: TrackingState,
    pump: Option<DeliveryPump>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl TrackingController {
    pub fn new(
        platform: Arc<dyn LocationPlatform>,
        store: Arc<dyn DurableStore>,
        buffer_config: BufferConfig,
        subscription: SubscriptionConfig,
    ) -> Self {
        let metrics = Arc::new(MetricsRecorder::new());
        let buffer = SampleBuffer::with_metrics(store, buffer_config, metrics.clone());
        Self {
            platform,
            buffer: Arc::new(Mutex::new(buffer)),
            subscription,
            state: TrackingState::Idle,
            pump: None,
            metrics,
            logger: LogManager::new(),
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Tracking
    }

    /// Shared handle to the buffer fed by the delivery handler.
    pub fn buffer(&self) -> Arc<Mutex<SampleBuffer>> {
        self.buffer.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Requests permissions, re-arms any existing subscription, and
    /// registers the delivery handler.
    ///
    /// A permission refusal leaves the controller, buffer and store as they
    /// were.
    pub async fn start(&mut self) -> TrackingResult<()> {
        self.ensure_permissions().await?;

        if self
            .platform
            .is_subscribed()
            .await
            .map_err(TrackingError::Subscription)?
        {
            self.logger.record("Subscription already registered, stopping first");
            self.platform
                .unsubscribe()
                .await
                .map_err(TrackingError::Subscription)?;
        }
        if let Some(pump) = self.pump.take() {
            pump.shutdown().await;
        }
        self.state = TrackingState::Idle;

        let (sink, deliveries) = DeliverySink::channel(DELIVERY_QUEUE_DEPTH);
        self.platform
            .subscribe(&self.subscription, sink)
            .await
            .map_err(TrackingError::Subscription)?;

        let retry_after = self.buffer.lock().await.config().batch_time();
        self.pump = Some(DeliveryPump::spawn(
            self.buffer.clone(),
            deliveries,
            retry_after,
        ));
        self.state = TrackingState::Tracking;
        self.logger.record("Background tracking started");
        Ok(())
    }

    /// Unregisters the subscription if one is active, drains queued
    /// deliveries, then forces a flush. Safe to call while idle.
    ///
    /// The flush runs even when unsubscribing fails; the subscription error
    /// is the one reported.
    pub async fn stop(&mut self) -> TrackingResult<()> {
        let unsubscribed = match self.platform.is_subscribed().await {
            Ok(true) => self.platform.unsubscribe().await.map(|_| {
                self.logger.record("Background tracking stopped");
            }),
            Ok(false) => Ok(()),
            Err(err) => Err(err),
        };

        if let Some(pump) = self.pump.take() {
            pump.shutdown().await;
        }
        self.state = TrackingState::Idle;

        let flushed = self.buffer.lock().await.flush().await;
        unsubscribed.map_err(TrackingError::Subscription)?;
        flushed.map(|_| ())
    }

    /// Durable ledger size; samples still pending are not included.
    pub async fn buffer_count(&self) -> TrackingResult<usize> {
        self.buffer.lock().await.count().await
    }

    pub async fn clear(&self) -> TrackingResult<()> {
        self.buffer.lock().await.clear().await
    }

    pub async fn activity_state(&self) -> ActivityState {
        let buffer = self.buffer.lock().await;
        let buffer_count = match buffer.count().await {
            Ok(count) => count,
            Err(err) => {
                self.logger
                    .error(&format!("Failed to get buffer count: {}", err));
                0
            }
        };
        ActivityState {
            is_tracking: self.is_tracking(),
            buffer_count,
            last_location: buffer.last_seen(),
        }
    }

    pub async fn start_background_tracking(&mut self) -> bool {
        match self.start().await {
            Ok(()) => true,
            Err(err) if !err.is_retryable() => {
                self.logger.warn(&format!("Tracking not started: {}", err));
                false
            }
            Err(err) => {
                self.logger
                    .error(&format!("Failed to start tracking: {}", err));
                false
            }
        }
    }

    pub async fn stop_background_tracking(&mut self) -> bool {
        match self.stop().await {
            Ok(()) => true,
            Err(err) => {
                self.logger.error(&format!("Failed to stop tracking: {}", err));
                false
            }
        }
    }

    pub async fn get_buffer_count(&self) -> usize {
        match self.buffer_count().await {
            Ok(count) => count,
            Err(err) => {
                self.logger
                    .error(&format!("Failed to get buffer count: {}", err));
                0
            }
        }
    }

    pub async fn clear_buffer(&self) {
        if let Err(err) = self.clear().await {
            self.logger.error(&format!("Failed to clear buffer: {}", err));
        }
    }

    async fn ensure_permissions(&self) -> TrackingResult<()> {
        for scope in [PermissionScope::Foreground, PermissionScope::Background] {
            match self.platform.request_permission(scope).await {
                Ok(PermissionStatus::Granted) => {}
                Ok(_) => {
                    self.logger.warn(&format!("{} permission denied", scope));
                    return Err(TrackingError::PermissionDenied(scope));
                }
                Err(err) => {
                    self.logger
                        .error(&format!("{} permission request failed: {}", scope, err));
                    return Err(TrackingError::PermissionDenied(scope));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::RawLocationUpdate;
    use crate::store::MemoryStore;
    use crate::tracking::platform::PlatformError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const KEY: &str = "@worldpaint:location_buffer";

    /// Platform double that records calls and exposes the registered sink.
    #[derive(Default)]
    struct FakePlatform {
        deny: Option<PermissionScope>,
        fail_unsubscribe: AtomicBool,
        subscribed: AtomicBool,
        subscribes: AtomicUsize,
        unsubscribes: AtomicUsize,
        requests: std::sync::Mutex<Vec<PermissionScope>>,
        sink: std::sync::Mutex<Option<DeliverySink>>,
    }

    impl FakePlatform {
        fn denying(scope: PermissionScope) -> Self {
            Self {
                deny: Some(scope),
                ..Default::default()
            }
        }

        fn sink(&self) -> DeliverySink {
            self.sink.lock().unwrap().clone().expect("not subscribed")
        }
    }

    #[async_trait]
    impl LocationPlatform for FakePlatform {
        async fn request_permission(
            &self,
            scope: PermissionScope,
        ) -> Result<PermissionStatus, PlatformError> {
            self.requests.lock().unwrap().push(scope);
            if self.deny == Some(scope) {
                Ok(PermissionStatus::Denied)
            } else {
                Ok(PermissionStatus::Granted)
            }
        }

        async fn is_subscribed(&self) -> Result<bool, PlatformError> {
            Ok(self.subscribed.load(Ordering::SeqCst))
        }

        async fn subscribe(
            &self,
            _config: &SubscriptionConfig,
            sink: DeliverySink,
        ) -> Result<(), PlatformError> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            self.subscribed.store(true, Ordering::SeqCst);
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        async fn unsubscribe(&self) -> Result<(), PlatformError> {
            if self.fail_unsubscribe.load(Ordering::SeqCst) {
                return Err(PlatformError::Rejected("task not found".into()));
            }
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
            self.subscribed.store(false, Ordering::SeqCst);
            self.sink.lock().unwrap().take();
            Ok(())
        }
    }

    fn controller(platform: &Arc<FakePlatform>, store: &Arc<MemoryStore>) -> TrackingController {
        TrackingController::new(
            platform.clone(),
            store.clone(),
            BufferConfig::default(),
            SubscriptionConfig::default(),
        )
    }

    fn fixes(range: std::ops::Range<i64>) -> Vec<RawLocationUpdate> {
        range
            .map(|i| RawLocationUpdate::new(10.0 + i as f64 * 1e-4, 20.0, i * 3_000))
            .collect()
    }

    async fn wait_for_count(controller: &TrackingController, expected: usize) {
        for _ in 0..200 {
            if controller.get_buffer_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("ledger never reached {} samples", expected);
    }

    #[tokio::test]
    async fn denied_permission_leaves_everything_untouched() {
        let platform = Arc::new(FakePlatform::denying(PermissionScope::Foreground));
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);

        assert!(!controller.start_background_tracking().await);
        assert_eq!(controller.state(), TrackingState::Idle);
        assert_eq!(controller.get_buffer_count().await, 0);
        assert_eq!(store.write_count(), 0);
        assert_eq!(platform.subscribes.load(Ordering::SeqCst), 0);
        assert_eq!(
            *platform.requests.lock().unwrap(),
            vec![PermissionScope::Foreground]
        );
    }

    #[tokio::test]
    async fn background_denial_is_reported() {
        let platform = Arc::new(FakePlatform::denying(PermissionScope::Background));
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);

        let err = controller.start().await.unwrap_err();
        assert!(matches!(
            err,
            TrackingError::PermissionDenied(PermissionScope::Background)
        ));
        assert!(!controller.is_tracking());
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);

        assert!(controller.stop_background_tracking().await);
        assert!(controller.stop_background_tracking().await);
        assert_eq!(store.write_count(), 0);
        assert_eq!(platform.unsubscribes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_forces_flush_of_single_sample() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        let sample_a = LocationSample::new(1.0, 2.0, 3);

        controller
            .buffer()
            .lock()
            .await
            .append(vec![sample_a])
            .await
            .unwrap();
        assert_eq!(controller.get_buffer_count().await, 0);

        assert!(controller.stop_background_tracking().await);
        assert_eq!(store.read(KEY).await.unwrap(), Some(vec![sample_a]));
        assert_eq!(controller.get_buffer_count().await, 1);
    }

    #[tokio::test]
    async fn deliveries_flow_into_the_ledger() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);

        assert!(controller.start_background_tracking().await);
        assert_eq!(controller.state(), TrackingState::Tracking);

        let sink = platform.sink();
        sink.deliver(fixes(0..4)).await.unwrap();
        sink.deliver(fixes(4..10)).await.unwrap();
        wait_for_count(&controller, 10).await;

        sink.deliver(fixes(10..13)).await.unwrap();
        assert!(controller.stop_background_tracking().await);
        assert_eq!(controller.state(), TrackingState::Idle);
        assert_eq!(controller.get_buffer_count().await, 13);

        let ledger = store.read(KEY).await.unwrap().unwrap();
        let timestamps: Vec<i64> = ledger.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, (0..13).map(|i| i * 3_000).collect::<Vec<_>>());
        assert!(sink.deliver(fixes(13..14)).await.is_err());
    }

    #[tokio::test]
    async fn delivery_errors_do_not_stop_the_handler() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();

        let sink = platform.sink();
        sink.report_error("kCLErrorDomain 0").await.unwrap();
        sink.deliver(fixes(0..2)).await.unwrap();
        controller.stop().await.unwrap();

        assert_eq!(controller.get_buffer_count().await, 2);
        assert_eq!(controller.metrics().samples_received, 2);
    }

    #[tokio::test]
    async fn restart_rearms_existing_subscription() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);

        controller.start().await.unwrap();
        platform.sink().deliver(fixes(0..3)).await.unwrap();
        controller.start().await.unwrap();

        assert_eq!(platform.subscribes.load(Ordering::SeqCst), 2);
        assert_eq!(platform.unsubscribes.load(Ordering::SeqCst), 1);
        assert!(controller.is_tracking());
        assert_eq!(controller.buffer().lock().await.pending().len(), 3);

        controller.stop().await.unwrap();
        assert_eq!(controller.get_buffer_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_is_flushed_by_the_timer() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();

        platform.sink().deliver(fixes(0..9)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30_001)).await;
        wait_for_count(&controller, 9).await;
        assert_eq!(store.write_count(), 1);

        controller.stop().await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn stop_reports_flush_failure_and_keeps_samples() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();
        platform.sink().deliver(fixes(0..4)).await.unwrap();

        store.fail_next_writes(1);
        assert!(!controller.stop_background_tracking().await);
        assert_eq!(controller.state(), TrackingState::Idle);
        assert_eq!(controller.buffer().lock().await.pending().len(), 4);

        assert!(controller.stop_background_tracking().await);
        assert_eq!(controller.get_buffer_count().await, 4);
    }

    #[tokio::test]
    async fn failed_unsubscribe_still_flushes() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();
        platform.sink().deliver(fixes(0..2)).await.unwrap();

        platform.fail_unsubscribe.store(true, Ordering::SeqCst);
        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, TrackingError::Subscription(_)));
        assert_eq!(controller.get_buffer_count().await, 2);
    }

    #[tokio::test]
    async fn clear_buffer_resets_count() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();
        platform.sink().deliver(fixes(0..12)).await.unwrap();
        wait_for_count(&controller, 12).await;

        controller.clear_buffer().await;
        assert_eq!(controller.get_buffer_count().await, 0);

        let state = controller.activity_state().await;
        assert!(state.is_tracking);
        assert_eq!(state.buffer_count, 0);
        assert!(state.last_location.is_none());
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn activity_state_tracks_last_location() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();
        platform.sink().deliver(fixes(0..3)).await.unwrap();
        controller.stop().await.unwrap();

        let state = controller.activity_state().await;
        assert!(!state.is_tracking);
        assert_eq!(state.buffer_count, 3);
        assert_eq!(state.last_location.map(|s| s.timestamp), Some(6_000));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_follows_the_last_size_flush() {
        let platform = Arc::new(FakePlatform::default());
        let store = Arc::new(MemoryStore::new());
        let mut controller = controller(&platform, &store);
        controller.start().await.unwrap();
        let sink = platform.sink();

        tokio::time::sleep(Duration::from_secs(20)).await;
        sink.deliver(fixes(0..10)).await.unwrap();
        wait_for_count(&controller, 10).await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        sink.deliver(fixes(10..11)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(27)).await;
        assert_eq!(controller.get_buffer_count().await, 10);

        tokio::time::sleep(Duration::from_secs(3)).await;
        wait_for_count(&controller, 11).await;
        assert_eq!(store.write_count(), 2);
        controller.stop().await.unwrap();
    }
}
