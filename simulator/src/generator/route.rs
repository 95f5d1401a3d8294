use anyhow::{ensure, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trackcore::sample::{RawCoords, RawLocationUpdate};

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Configuration for generating a synthetic walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub points: usize,
    pub step_meters: f64,
    pub interval_ms: i64,
    pub start_timestamp_ms: i64,
    /// Horizontal accuracy reported with each fix.
    pub accuracy_meters: f64,
    /// Chance that a fix arrives with no altitude/speed/heading.
    pub sparse_ratio: f64,
    pub seed: u64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            origin_latitude: 37.7749,
            origin_longitude: -122.4194,
            points: 120,
            step_meters: 4.0,
            interval_ms: 3_000,
            start_timestamp_ms: 1_700_000_000_000,
            accuracy_meters: 5.0,
            sparse_ratio: 0.1,
            seed: 0,
        }
    }
}

/// Random walk starting at the configured origin.
pub fn build_route(config: &RouteConfig) -> anyhow::Result<Vec<RawLocationUpdate>> {
    ensure!(
        (0.0..=1.0).contains(&config.sparse_ratio),
        "sparse_ratio must be within [0, 1], got {}",
        config.sparse_ratio
    );
    let span = (config.points as i64)
        .checked_mul(config.interval_ms)
        .context("overflow computing route duration")?;
    config
        .start_timestamp_ms
        .checked_add(span)
        .context("route timestamps overflow")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut latitude = config.origin_latitude;
    let mut longitude = config.origin_longitude;
    let mut heading: f64 = rng.gen_range(0.0..360.0);
    let speed = config.step_meters / (config.interval_ms.max(1) as f64 / 1_000.0);
    let mut updates = Vec::with_capacity(config.points);

    for index in 0..config.points {
        heading = (heading + rng.gen_range(-25.0..25.0)).rem_euclid(360.0);
        let radians = heading.to_radians();
        let meters_per_degree_lon = METERS_PER_DEGREE_LAT * latitude.to_radians().cos().max(1e-6);
        latitude += config.step_meters * radians.cos() / METERS_PER_DEGREE_LAT;
        longitude += config.step_meters * radians.sin() / meters_per_degree_lon;

        let sparse = rng.gen_bool(config.sparse_ratio);
        updates.push(RawLocationUpdate {
            coords: RawCoords {
                latitude,
                longitude,
                altitude: (!sparse).then(|| 15.0 + rng.gen_range(-1.0..1.0)),
                accuracy: Some(config.accuracy_meters),
                altitude_accuracy: (!sparse).then_some(3.0),
                speed: (!sparse).then_some(speed),
                heading: (!sparse).then_some(heading),
            },
            timestamp: config.start_timestamp_ms + index as i64 * config.interval_ms,
        });
    }

    Ok(updates)
}
