use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use trackcore::prelude::BufferConfig;
use trackcore::tracking::SubscriptionConfig;

use crate::generator::route::RouteConfig;
use crate::platform::simulated::PermissionGrants;
use crate::store::faulty::StoreFaults;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Directory holding the durable ledger files.
    pub store_dir: PathBuf,
    /// Fixes per platform delivery.
    pub delivery_size: usize,
    pub buffer: BufferConfig,
    pub subscription: SubscriptionConfig,
    pub permissions: PermissionGrants,
    pub route: RouteConfig,
    /// Ledger failures injected during a session.
    pub store_faults: StoreFaults,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("tools/data/ledger"),
            delivery_size: 3,
            buffer: BufferConfig::default(),
            subscription: SubscriptionConfig::default(),
            permissions: PermissionGrants::default(),
            route: RouteConfig::default(),
            store_faults: StoreFaults::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(store_dir: PathBuf, points: usize, delivery_size: usize, seed: u64) -> Self {
        let defaults = Self::default();
        Self {
            store_dir,
            delivery_size,
            route: RouteConfig {
                points,
                seed,
                ..defaults.route.clone()
            },
            ..defaults
        }
    }
}
