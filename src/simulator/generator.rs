//! Seeded synthetic reading generation
//!
//! Normal values are drawn around the centre of each sensor's threshold
//! band and clamped into it, so injected anomaly counts are honoured
//! exactly; anomalous values land clearly outside the band. Every generated
//! reading is tagged at creation time, the same place the real ingestion
//! pipeline tags.

use super::{tag_anomalies, threshold_band, MemoryStore};
use crate::model::{GeoPoint, Reading};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One simulated node definition
#[derive(Debug, Clone)]
pub struct NodeSeed {
    pub id: String,
    pub sensors: Vec<String>,
    pub location: Option<GeoPoint>,
}

impl NodeSeed {
    pub fn new(id: impl Into<String>, sensors: &[&str]) -> Self {
        Self {
            id: id.into(),
            sensors: sensors.iter().map(|s| s.to_string()).collect(),
            location: None,
        }
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(GeoPoint {
            latitude,
            longitude,
        });
        self
    }
}

/// Generator parameters
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Probability of an anomalous value per sensor per reading in
    /// continuous mode
    pub anomaly_rate: f64,
    pub nodes: Vec<NodeSeed>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            anomaly_rate: 0.05,
            nodes: vec![
                NodeSeed::new(
                    "node-001",
                    &["flowRate", "waterLevel", "pH", "turbidity", "temperature"],
                )
                .at(46.5191, 6.6323),
                NodeSeed::new("node-002", &["flowRate", "pH", "turbidity"]).at(46.5218, 6.6334),
                NodeSeed::new("node-003", &["waterLevel", "temperature"]).at(46.5107, 6.6285),
            ],
        }
    }
}

/// Deterministic value source for simulated readings
pub struct Generator {
    rng: StdRng,
    anomaly_rate: f64,
}

impl Generator {
    pub fn new(seed: u64, anomaly_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            anomaly_rate,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.seed, config.anomaly_rate)
    }

    /// Standard normal draw, Box-Muller
    fn gauss(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// In-band value near the band centre; None for keys without a band
    pub fn normal_value(&mut self, key: &str) -> Option<f64> {
        let band = threshold_band(key)?;
        let centre = (band.min + band.max) / 2.0;
        let span = (band.max - band.min) / 4.0;
        let value = (centre + self.gauss() * span).clamp(band.min, band.max);
        Some(round2(value))
    }

    /// Value clearly outside the band, below or above at random
    pub fn anomalous_value(&mut self, key: &str) -> Option<f64> {
        let band = threshold_band(key)?;
        let offset = self
            .rng
            .gen_range(0.5..=(band.max * 0.1 + 0.5).max(1.0));
        let value = if self.rng.gen_bool(0.5) {
            band.min - offset
        } else {
            band.max + offset
        };
        Some(round2(value))
    }

    /// One reading for a node, each sensor anomalous with the configured
    /// probability
    pub fn reading_at(&mut self, node: &NodeSeed, timestamp: DateTime<Utc>) -> Reading {
        let mut sensor_data = BTreeMap::new();
        for key in &node.sensors {
            let value = if self.rng.gen_bool(self.anomaly_rate.clamp(0.0, 1.0)) {
                self.anomalous_value(key)
            } else {
                self.normal_value(key)
            };
            sensor_data.insert(key.clone(), value);
        }
        let tags = tag_anomalies(&sensor_data);
        Reading::new(&node.id, timestamp, sensor_data, tags)
    }

    /// Historical batch for one node: `count` readings spaced `spacing`
    /// apart ending just before `newest`, normal everywhere except the
    /// per-sensor injection counts, which are placed at random indices.
    pub fn batch(
        &mut self,
        node: &NodeSeed,
        count: usize,
        newest: DateTime<Utc>,
        spacing: ChronoDuration,
        anomaly_counts: &BTreeMap<String, usize>,
    ) -> Vec<Reading> {
        let mut rows: Vec<(DateTime<Utc>, BTreeMap<String, Option<f64>>)> = (0..count)
            .map(|i| {
                let ts = newest - spacing * ((count - i) as i32);
                let values = node
                    .sensors
                    .iter()
                    .map(|key| (key.clone(), self.normal_value(key)))
                    .collect();
                (ts, values)
            })
            .collect();

        for (key, wanted) in anomaly_counts {
            if !node.sensors.contains(key) {
                continue;
            }
            let wanted = (*wanted).min(count);
            if wanted == 0 {
                continue;
            }
            let indices = rand::seq::index::sample(&mut self.rng, count, wanted);
            for idx in indices {
                let value = self.anomalous_value(key);
                rows[idx].1.insert(key.clone(), value);
            }
        }

        rows.into_iter()
            .map(|(ts, sensor_data)| {
                let tags = tag_anomalies(&sensor_data);
                Reading::new(&node.id, ts, sensor_data, tags)
            })
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Register the configured nodes and insert one historical batch per node
pub async fn seed_history(
    store: &MemoryStore,
    config: &GeneratorConfig,
    count: usize,
    anomaly_counts: &BTreeMap<String, usize>,
) {
    let mut generator = Generator::from_config(config);
    let newest = Utc::now();
    for node in &config.nodes {
        store
            .ensure_node(&node.id, node.sensors.clone(), node.location)
            .await;
        let batch = generator.batch(
            node,
            count,
            newest,
            ChronoDuration::seconds(5),
            anomaly_counts,
        );
        store.insert_readings(batch).await;
    }
    info!(
        nodes = config.nodes.len(),
        per_node = count,
        "seeded historical readings"
    );
}

/// Continuous mode: append one reading per node every `interval` until the
/// token is cancelled
pub async fn run_generator(
    store: MemoryStore,
    config: GeneratorConfig,
    interval: Duration,
    token: CancellationToken,
) {
    let mut generator = Generator::from_config(&config);
    for node in &config.nodes {
        store
            .ensure_node(&node.id, node.sensors.clone(), node.location)
            .await;
    }

    info!(
        interval_secs = interval.as_secs(),
        anomaly_rate = config.anomaly_rate,
        "starting generator loop"
    );
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("generator loop stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let now = Utc::now();
        let batch: Vec<Reading> = config
            .nodes
            .iter()
            .map(|node| generator.reading_at(node, now))
            .collect();
        debug!(count = batch.len(), "inserting generated batch");
        store.insert_readings(batch).await;
    }
}
