use crate::generator::route::build_route;
use crate::platform::simulated::SimulatedPlatform;
use crate::store::faulty::FaultyStore;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use trackcore::store::{DurableStore, FileStore};
use trackcore::telemetry::MetricsSnapshot;
use trackcore::tracking::TrackingController;

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started: bool,
    pub deliveries: usize,
    pub points_delivered: usize,
    pub stopped: bool,
    pub ledger_count: usize,
    pub metrics: MetricsSnapshot,
}

/// Drives one tracking session against a file-backed ledger.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Builds the controller over the file ledger. Configured store faults
    /// are only injected into tracking sessions.
    async fn controller(
        &self,
        inject_faults: bool,
    ) -> anyhow::Result<(TrackingController, Arc<SimulatedPlatform>)> {
        let store_dir = &self.config.store_dir;
        let mut store: Arc<dyn DurableStore> = Arc::new(
            FileStore::open(store_dir)
                .await
                .with_context(|| format!("opening ledger store {}", store_dir.display()))?,
        );
        let faults = self.config.store_faults;
        if inject_faults && !faults.is_empty() {
            log::info!(
                "injecting {} read and {} write failure(s)",
                faults.read_failures,
                faults.write_failures
            );
            store = Arc::new(FaultyStore::new(store, faults));
        }
        let platform = Arc::new(SimulatedPlatform::new(self.config.permissions));
        let controller = TrackingController::new(
            platform.clone(),
            store,
            self.config.buffer.clone(),
            self.config.subscription.clone(),
        );
        Ok((controller, platform))
    }

    /// Start, push the whole route in fixed-size deliveries, stop.
    pub async fn execute(&self) -> anyhow::Result<SessionReport> {
        self.run_session(None, std::future::pending::<()>()).await
    }

    /// Like [`Runner::execute`] but paced by `interval`, ending early when
    /// `interrupt` resolves. Stop (and its forced flush) always runs.
    pub async fn execute_live<F>(
        &self,
        interval: Duration,
        interrupt: F,
    ) -> anyhow::Result<SessionReport>
    where
        F: Future<Output = ()>,
    {
        self.run_session(Some(interval), interrupt).await
    }

    async fn run_session<F>(
        &self,
        pace: Option<Duration>,
        interrupt: F,
    ) -> anyhow::Result<SessionReport>
    where
        F: Future<Output = ()>,
    {
        let route = build_route(&self.config.route).context("building synthetic route")?;
        let (mut controller, platform) = self.controller(true).await?;

        let mut report = SessionReport {
            started: controller.start_background_tracking().await,
            deliveries: 0,
            points_delivered: 0,
            stopped: false,
            ledger_count: 0,
            metrics: MetricsSnapshot::default(),
        };

        if report.started {
            tokio::pin!(interrupt);
            for chunk in route.chunks(self.config.delivery_size.max(1)) {
                if let Some(pace) = pace {
                    tokio::select! {
                        _ = &mut interrupt => {
                            log::info!("interrupted, stopping tracking");
                            break;
                        }
                        _ = tokio::time::sleep(pace) => {}
                    }
                }
                platform
                    .deliver(chunk.to_vec())
                    .await
                    .with_context(|| format!("delivery {}", report.deliveries + 1))?;
                report.deliveries += 1;
                report.points_delivered += chunk.len();
            }
            report.stopped = controller.stop_background_tracking().await;
        }

        report.ledger_count = controller
            .buffer_count()
            .await
            .context("reading ledger size")?;
        report.metrics = controller.metrics();
        Ok(report)
    }

    pub async fn ledger_count(&self) -> anyhow::Result<usize> {
        let (controller, _) = self.controller(false).await?;
        controller
            .buffer_count()
            .await
            .context("reading ledger size")
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        let (controller, _) = self.controller(false).await?;
        controller.clear().await.context("clearing ledger")
    }
}
