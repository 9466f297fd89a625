//! In-memory development backend
//!
//! A stand-in for the production ingestion pipeline and REST backend: a
//! seeded generator feeds an in-memory store, readings are tagged against
//! the static threshold table at creation time, and [`server`] exposes the
//! same REST surface the dashboard client consumes in production.

pub mod generator;
pub mod server;

pub use generator::{run_generator, seed_history, Generator, GeneratorConfig, NodeSeed};

use crate::client::ReadingsQuery;
use crate::error::{Result, SensorViewError};
use crate::model::{
    GeoPoint, NodeStatus, NodeTimeRange, Reading, SensorNode, SensorSlice, SeriesPoint,
};
use crate::range::ResolvedRange;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Most rows any single query returns
const QUERY_LIMIT: usize = 2000;

/// A node goes `Inactive` once its newest reading is older than this
const ACTIVE_WINDOW_HOURS: i64 = 24;

/// Expected value band for one sensor type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdBand {
    pub min: f64,
    pub max: f64,
}

impl ThresholdBand {
    /// Strictly outside the band counts as anomalous; the band edges are
    /// still normal
    pub fn is_anomalous(&self, value: f64) -> bool {
        value < self.min || value > self.max
    }
}

/// Threshold rules applied by the ingestion-side tagger
static THRESHOLDS: Lazy<BTreeMap<&'static str, ThresholdBand>> = Lazy::new(|| {
    BTreeMap::from([
        ("flowRate", ThresholdBand { min: 50.0, max: 300.0 }),
        ("waterLevel", ThresholdBand { min: 0.2, max: 5.0 }),
        ("pH", ThresholdBand { min: 6.5, max: 8.0 }),
        ("turbidity", ThresholdBand { min: 0.0, max: 10.0 }),
        ("temperature", ThresholdBand { min: 5.0, max: 35.0 }),
    ])
});

/// Band for a sensor key, if one is configured
pub fn threshold_band(key: &str) -> Option<ThresholdBand> {
    THRESHOLDS.get(key).copied()
}

/// Sensor keys with configured bands
pub fn threshold_keys() -> impl Iterator<Item = &'static str> {
    THRESHOLDS.keys().copied()
}

/// The ingestion-side tagger: returns the sensor keys whose values fall
/// strictly outside their band. Null values and keys without a band never
/// tag.
pub fn tag_anomalies(sensor_data: &BTreeMap<String, Option<f64>>) -> Vec<String> {
    let mut tags = Vec::new();
    for (key, value) in sensor_data {
        let (Some(band), Some(value)) = (THRESHOLDS.get(key.as_str()), value) else {
            continue;
        };
        if band.is_anomalous(*value) {
            tags.push(key.clone());
        }
    }
    tags
}

#[derive(Debug, Clone, Default)]
struct NodeRecord {
    sensors: Vec<String>,
    location: Option<GeoPoint>,
}

#[derive(Default)]
struct StoreInner {
    nodes: BTreeMap<String, NodeRecord>,
    readings: Vec<Reading>,
}

/// Shared in-memory store behind the simulator's REST surface
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a node definition
    pub async fn ensure_node(
        &self,
        node_id: impl Into<String>,
        sensors: Vec<String>,
        location: Option<GeoPoint>,
    ) {
        let mut inner = self.inner.write().await;
        let record = inner.nodes.entry(node_id.into()).or_default();
        record.sensors = sensors;
        record.location = location;
    }

    /// Append a batch of readings
    pub async fn insert_readings(&self, batch: Vec<Reading>) {
        let mut inner = self.inner.write().await;
        inner.readings.extend(batch);
    }

    pub async fn reading_count(&self) -> usize {
        self.inner.read().await.readings.len()
    }

    /// Node list with status derived from the newest reading age
    pub async fn nodes(&self, now: DateTime<Utc>) -> Vec<SensorNode> {
        let inner = self.inner.read().await;
        let cutoff = now - Duration::hours(ACTIVE_WINDOW_HOURS);
        inner
            .nodes
            .iter()
            .map(|(node_id, record)| {
                let last_seen = latest_for(&inner.readings, node_id);
                let status = match last_seen {
                    Some(ts) if ts >= cutoff => NodeStatus::Active,
                    _ => NodeStatus::Inactive,
                };
                SensorNode {
                    node_id: node_id.clone(),
                    sensors: record.sensors.clone(),
                    status,
                    last_seen,
                    location: record.location,
                }
            })
            .collect()
    }

    /// Readings for one node with the full wire query semantics: explicit
    /// bounds take precedence, symbolic selectors resolve against the node's
    /// newest reading, and a sensor filter drops readings where the key is
    /// missing or null.
    pub async fn node_readings(
        &self,
        node_id: &str,
        query: &ReadingsQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let inner = self.inner.read().await;
        if !inner.nodes.contains_key(node_id) {
            return Err(node_not_found(node_id));
        }

        let (start, end) = if query.start.is_some() || query.end.is_some() {
            (query.start, query.end)
        } else {
            let selector = query.selector.unwrap_or_default();
            match selector.resolve(now, latest_for(&inner.readings, node_id)) {
                ResolvedRange::Unbounded => (None, None),
                ResolvedRange::Empty => return Ok(Vec::new()),
                ResolvedRange::Window { start, end } => (Some(start), Some(end)),
            }
        };

        let mut rows: Vec<Reading> = inner
            .readings
            .iter()
            .filter(|r| r.node_id == node_id)
            .filter(|r| start.map_or(true, |s| r.timestamp >= s))
            .filter(|r| end.map_or(true, |e| r.timestamp <= e))
            .filter_map(|r| match &query.sensor {
                None => Some(r.clone()),
                Some(key) => {
                    let value = r.value(key)?;
                    let mut narrowed = r.clone();
                    narrowed.sensor_data = BTreeMap::from([(key.clone(), Some(value))]);
                    Some(narrowed)
                }
            })
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        rows.truncate(QUERY_LIMIT);
        Ok(rows)
    }

    /// Legacy anomaly endpoint: tagged points for one sensor in the window
    pub async fn anomaly_points(
        &self,
        node_id: &str,
        sensor: &str,
        query: &ReadingsQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeriesPoint>> {
        let narrowed = ReadingsQuery {
            sensor: Some(sensor.to_string()),
            ..query.clone()
        };
        let readings = self.node_readings(node_id, &narrowed, now).await?;
        Ok(readings
            .iter()
            .filter(|r| r.is_anomalous(sensor))
            .filter_map(|r| r.value(sensor).map(|v| SeriesPoint::new(r.timestamp, v)))
            .collect())
    }

    /// Oldest and newest reading timestamps for a node. A known node with
    /// no readings yields nulls; an unknown node without readings is a 404.
    pub async fn time_range(&self, node_id: &str) -> Result<NodeTimeRange> {
        let inner = self.inner.read().await;
        let mut first = None;
        let mut last = None;
        for reading in inner.readings.iter().filter(|r| r.node_id == node_id) {
            if first.map_or(true, |f| reading.timestamp < f) {
                first = Some(reading.timestamp);
            }
            if last.map_or(true, |l| reading.timestamp > l) {
                last = Some(reading.timestamp);
            }
        }

        if first.is_none() && !inner.nodes.contains_key(node_id) {
            return Err(node_not_found(node_id));
        }
        Ok(NodeTimeRange {
            node_id: node_id.to_string(),
            first_seen: first,
            last_seen: last,
        })
    }

    /// Cross-node rows for one sensor key: one row per timestamp, only
    /// non-null values, data-anchored selectors resolve against the newest
    /// reading that carries the key.
    pub async fn sensor_series(
        &self,
        sensor_key: &str,
        query: &ReadingsQuery,
        now: DateTime<Utc>,
    ) -> Vec<SensorSlice> {
        let inner = self.inner.read().await;
        let latest = inner
            .readings
            .iter()
            .filter(|r| r.value(sensor_key).is_some())
            .map(|r| r.timestamp)
            .max();

        let selector = query.selector.unwrap_or_default();
        let resolved = selector.resolve(now, latest);
        if resolved.is_empty() {
            return Vec::new();
        }

        let mut grouped: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>> = BTreeMap::new();
        for reading in &inner.readings {
            let Some(value) = reading.value(sensor_key) else {
                continue;
            };
            if !resolved.contains(reading.timestamp) {
                continue;
            }
            grouped
                .entry(reading.timestamp)
                .or_default()
                .insert(reading.node_id.clone(), value);
        }

        grouped
            .into_iter()
            .take(QUERY_LIMIT)
            .map(|(timestamp, values)| SensorSlice { timestamp, values })
            .collect()
    }
}

fn latest_for(readings: &[Reading], node_id: &str) -> Option<DateTime<Utc>> {
    readings
        .iter()
        .filter(|r| r.node_id == node_id)
        .map(|r| r.timestamp)
        .max()
}

fn node_not_found(node_id: &str) -> SensorViewError {
    SensorViewError::not_found(format!("Node '{node_id}' not found"))
}
