use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use trackcore::prelude::PermissionScope;
use trackcore::sample::RawLocationUpdate;
use trackcore::tracking::{
    DeliverySink, LocationPlatform, PermissionStatus, PlatformError, SubscriptionConfig,
};

/// Answers the simulated permission prompts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionGrants {
    pub foreground: bool,
    pub background: bool,
}

impl Default for PermissionGrants {
    fn default() -> Self {
        Self {
            foreground: true,
            background: true,
        }
    }
}

/// Stand-in for the device location service: grants are scripted and fixes
/// are pushed by the driver through [`SimulatedPlatform::deliver`].
pub struct SimulatedPlatform {
    grants: PermissionGrants,
    subscription: Mutex<Option<(SubscriptionConfig, DeliverySink)>>,
}

impl SimulatedPlatform {
    pub fn new(grants: PermissionGrants) -> Self {
        Self {
            grants,
            subscription: Mutex::new(None),
        }
    }

    /// Pushes one batch to the registered handler.
    pub async fn deliver(&self, updates: Vec<RawLocationUpdate>) -> anyhow::Result<()> {
        let sink = self
            .subscription
            .lock()
            .map_err(|_| anyhow::anyhow!("subscription slot poisoned"))?
            .as_ref()
            .map(|(_, sink)| sink.clone())
            .context("no delivery subscription registered")?;
        sink.deliver(updates).await.context("delivering location batch")
    }

    fn slot(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<(SubscriptionConfig, DeliverySink)>>, PlatformError>
    {
        self.subscription
            .lock()
            .map_err(|_| PlatformError::Unavailable("subscription slot poisoned".into()))
    }
}

#[async_trait]
impl LocationPlatform for SimulatedPlatform {
    async fn request_permission(
        &self,
        scope: PermissionScope,
    ) -> Result<PermissionStatus, PlatformError> {
        let granted = match scope {
            PermissionScope::Foreground => self.grants.foreground,
            PermissionScope::Background => self.grants.background,
        };
        Ok(if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        })
    }

    async fn is_subscribed(&self) -> Result<bool, PlatformError> {
        Ok(self.slot()?.is_some())
    }

    async fn subscribe(
        &self,
        config: &SubscriptionConfig,
        sink: DeliverySink,
    ) -> Result<(), PlatformError> {
        let mut slot = self.slot()?;
        if slot.is_some() {
            return Err(PlatformError::Rejected("subscription already active".into()));
        }
        log::info!(
            "[platform] subscribed: accuracy {:?}, every {} ms / {} m",
            config.accuracy,
            config.min_time_interval_ms,
            config.min_distance_meters
        );
        *slot = Some((config.clone(), sink));
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), PlatformError> {
        self.slot()?.take();
        Ok(())
    }
}
