use serde::{Deserialize, Serialize};

use crate::sample::record::LocationSample;

/// Coordinate block of a platform fix. Everything but the position may be
/// missing depending on hardware and accuracy tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoords {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub altitude_accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
}

/// One location update as delivered by the platform location service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLocationUpdate {
    pub coords: RawCoords,
    pub timestamp: i64,
}

impl RawLocationUpdate {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            coords: RawCoords {
                latitude,
                longitude,
                altitude: None,
                accuracy: None,
                altitude_accuracy: None,
                speed: None,
                heading: None,
            },
            timestamp,
        }
    }
}

/// Normalizes a platform update. Total: never fails, and `altitude_accuracy`
/// is not carried into the sample.
pub fn to_sample(raw: &RawLocationUpdate) -> LocationSample {
    LocationSample {
        latitude: raw.coords.latitude,
        longitude: raw.coords.longitude,
        altitude: raw.coords.altitude,
        accuracy: raw.coords.accuracy,
        speed: raw.coords.speed,
        heading: raw.coords.heading,
        timestamp: raw.timestamp,
    }
}

impl From<&RawLocationUpdate> for LocationSample {
    fn from(raw: &RawLocationUpdate) -> Self {
        to_sample(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_readings_map_to_none() {
        let raw = RawLocationUpdate::new(51.5, -0.12, 1_700_000_000_000);
        let sample = to_sample(&raw);
        assert_eq!(sample, LocationSample::new(51.5, -0.12, 1_700_000_000_000));
    }

    #[test]
    fn full_fix_copies_every_reading() {
        let json = r#"{
            "coords": {
                "latitude": 37.7749,
                "longitude": -122.4194,
                "altitude": 16.5,
                "accuracy": 4.2,
                "altitudeAccuracy": 3.0,
                "speed": 1.4,
                "heading": 270.0
            },
            "timestamp": 1700000000123
        }"#;
        let raw: RawLocationUpdate = serde_json::from_str(json).unwrap();
        let sample = LocationSample::from(&raw);
        assert_eq!(sample.altitude, Some(16.5));
        assert_eq!(sample.accuracy, Some(4.2));
        assert_eq!(sample.speed, Some(1.4));
        assert_eq!(sample.heading, Some(270.0));
        assert_eq!(sample.timestamp, 1_700_000_000_123);
    }

    #[test]
    fn null_readings_from_platform_are_accepted() {
        let json = r#"{"coords":{"latitude":1.0,"longitude":2.0,"speed":null},"timestamp":5}"#;
        let raw: RawLocationUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(to_sample(&raw).speed, None);
    }
}
