use serde::{Deserialize, Serialize};

/// A single location sample captured during tracking.
///
/// Field order is the ledger's on-disk order. Optional readings persist as
/// `null` rather than being omitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    /// Milliseconds since the Unix epoch, as reported by the platform.
    pub timestamp: i64,
}

impl LocationSample {
    /// Sample carrying only the required fields.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp,
        }
    }
}
