//! Derived view state computed from a window of readings
//!
//! Views never keep incremental state across polls; each fetch hands the
//! whole window to these pure functions and replaces the previous snapshot
//! with the result. Clearing and recomputing therefore always lands on the
//! same values for the same window.

use crate::model::{Reading, SeriesPoint};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Sorted union of sensor keys across the whole window.
///
/// The union matters: nodes add probes over time, so later readings can
/// carry keys the first reading does not.
pub fn sensor_key_union(readings: &[Reading]) -> Vec<String> {
    let set: BTreeSet<&str> = readings.iter().flat_map(Reading::sensor_keys).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Most recent non-null value per sensor key.
///
/// A trailing null does not erase an earlier value for the key; it merely
/// leaves the previous observation as the latest one.
pub fn latest_values(readings: &[Reading]) -> BTreeMap<String, SeriesPoint> {
    let mut latest: BTreeMap<String, SeriesPoint> = BTreeMap::new();
    for reading in readings {
        for (key, value) in &reading.sensor_data {
            if let Some(v) = value {
                let candidate = SeriesPoint::new(reading.timestamp, *v);
                latest
                    .entry(key.clone())
                    .and_modify(|current| {
                        if reading.timestamp >= current.timestamp {
                            *current = candidate;
                        }
                    })
                    .or_insert(candidate);
            }
        }
    }
    latest
}

/// Chart-ready series for one sensor key, in window order, nulls skipped
pub fn series_for(readings: &[Reading], key: &str) -> Vec<SeriesPoint> {
    readings
        .iter()
        .filter_map(|r| r.value(key).map(|v| SeriesPoint::new(r.timestamp, v)))
        .collect()
}

/// Anomaly aggregation over one window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalySummary {
    /// Total number of anomaly points across all sensors
    pub total: usize,
    /// Per-sensor anomaly points, keyed by sensor name
    pub per_sensor: BTreeMap<String, Vec<SeriesPoint>>,
}

impl AnomalySummary {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Anomaly point count for one sensor key
    pub fn count_for(&self, key: &str) -> usize {
        self.per_sensor.get(key).map_or(0, Vec::len)
    }
}

/// Group tagged readings into per-sensor anomaly point lists.
///
/// A reading contributes a point for a key iff the key appears in the
/// reading's tag list and the reading holds a non-null value for it. Tags
/// on null values are dropped.
pub fn aggregate_anomalies(readings: &[Reading]) -> AnomalySummary {
    let mut per_sensor: BTreeMap<String, Vec<SeriesPoint>> = BTreeMap::new();
    for reading in readings {
        for key in &reading.anomalies {
            if let Some(value) = reading.value(key) {
                per_sensor
                    .entry(key.clone())
                    .or_default()
                    .push(SeriesPoint::new(reading.timestamp, value));
            }
        }
    }
    let total = per_sensor.values().map(Vec::len).sum();
    AnomalySummary { total, per_sensor }
}
