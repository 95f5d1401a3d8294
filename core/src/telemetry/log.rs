use log::{debug, error, info, warn};

const TARGET: &str = "location";

/// Thin wrapper over the `log` facade that pins every record to the
/// `location` target.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!(target: TARGET, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(target: TARGET, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: TARGET, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(target: TARGET, "{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
