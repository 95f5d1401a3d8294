use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::buffering::SampleBuffer;
use crate::sample::to_sample;
use crate::telemetry::LogManager;
use crate::tracking::platform::Delivery;

/// Single consumer of platform deliveries.
///
/// Deliveries are handled one at a time, each to completion (including any
/// flush) before the next is taken. Between deliveries the pump sleeps until
/// the buffer's age deadline so a partial batch does not wait for another fix.
/// A failed timed flush is retried no sooner than `retry_after` later.
pub(crate) struct DeliveryPump {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl DeliveryPump {
    pub(crate) fn spawn(
        buffer: Arc<Mutex<SampleBuffer>>,
        deliveries: mpsc::Receiver<Delivery>,
        retry_after: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(buffer, deliveries, shutdown_rx, retry_after));
        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Stops accepting deliveries, handles those already queued, and waits
    /// for the task to finish.
    pub(crate) async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(err) = self.handle.await {
            LogManager::new().error(&format!("Delivery handler task failed: {}", err));
        }
    }
}

async fn run(
    buffer: Arc<Mutex<SampleBuffer>>,
    mut deliveries: mpsc::Receiver<Delivery>,
    mut shutdown: oneshot::Receiver<()>,
    retry_after: Duration,
) {
    let logger = LogManager::new();
    let retry_after = retry_after.max(Duration::from_millis(1));
    let mut not_before = Instant::now();

    loop {
        let due = buffer
            .lock()
            .await
            .flush_due()
            .map(|due| due.max(not_before));

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            delivery = deliveries.recv() => match delivery {
                Some(delivery) => handle(&buffer, delivery, &logger).await,
                None => break,
            },
            _ = wait_until(due) => {
                let mut buffer = buffer.lock().await;
                if let Err(err) = buffer.maybe_flush().await {
                    logger.error(&format!("Timed flush failed: {}", err));
                    not_before = Instant::now() + retry_after;
                }
            }
        }
    }

    deliveries.close();
    while let Some(delivery) = deliveries.recv().await {
        handle(&buffer, delivery, &logger).await;
    }
}

/// Resolves at `deadline`, or never when nothing is pending.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn handle(buffer: &Mutex<SampleBuffer>, delivery: Delivery, logger: &LogManager) {
    match delivery {
        Delivery::Failed(message) => {
            logger.error(&format!("Background delivery error: {}", message));
        }
        Delivery::Locations(updates) => {
            logger.debug(&format!("Received {} location(s)", updates.len()));
            let samples = updates.iter().map(to_sample);
            let mut buffer = buffer.lock().await;
            if let Err(err) = buffer.append(samples).await {
                logger.error(&format!("Buffered delivery not yet persisted: {}", err));
            }
        }
    }
}
