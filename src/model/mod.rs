//! Data model for the dashboard client
//!
//! Wire types mirror the backend's JSON shapes (camelCase keys). Everything
//! here is read-only from the client's perspective: readings are immutable
//! once fetched, and all derived view state is recomputed per poll instead
//! of being written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node activity status derived by the backend from the newest reading age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Active,
    Inactive,
}

impl NodeStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, NodeStatus::Active)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Active => write!(f, "Active"),
            NodeStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Last-known node position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A physical sensor unit as listed by `GET /api/nodes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorNode {
    pub node_id: String,
    /// Sensor type names this node is provisioned with
    #[serde(default)]
    pub sensors: Vec<String>,
    pub status: NodeStatus,
    /// Timestamp of the newest stored reading, absent for nodes that never
    /// reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Optional position for the map view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// One timestamped observation for a node
///
/// `sensor_data` carries every sensor key the node reported at that instant;
/// values may be null when a probe misfired. `anomalies` lists the keys the
/// ingestion pipeline flagged as out of bounds for this reading and is the
/// single source of truth for anomaly display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sensor_data: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub anomalies: Vec<String>,
    /// Legacy 0/1 flag older consumers still read; 1 iff `anomalies` is
    /// non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<u8>,
}

impl Reading {
    /// Create a reading with the legacy flag kept consistent with the tag list
    pub fn new(
        node_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        sensor_data: BTreeMap<String, Option<f64>>,
        anomalies: Vec<String>,
    ) -> Self {
        let anomaly = Some(u8::from(!anomalies.is_empty()));
        Self {
            node_id: node_id.into(),
            timestamp,
            sensor_data,
            anomalies,
            anomaly,
        }
    }

    /// Non-null value for a sensor key, if the reading carries one
    pub fn value(&self, key: &str) -> Option<f64> {
        self.sensor_data.get(key).copied().flatten()
    }

    /// Whether the ingestion pipeline flagged this key for this reading
    pub fn is_anomalous(&self, key: &str) -> bool {
        self.anomalies.iter().any(|k| k == key)
    }

    /// Sensor keys present in this reading (null-valued keys included)
    pub fn sensor_keys(&self) -> impl Iterator<Item = &str> {
        self.sensor_data.keys().map(String::as_str)
    }
}

/// Oldest/newest reading timestamps for a node, from
/// `GET /api/nodes/{id}/time_range`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTimeRange {
    pub node_id: String,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl NodeTimeRange {
    /// Full data span, or None when the node has no readings yet
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.first_seen, self.last_seen) {
            (Some(first), Some(last)) => Some((first, last)),
            _ => None,
        }
    }
}

/// One chart-ready observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Cross-node series row from `GET /api/data/sensor/{key}`
///
/// The backend flattens node ids into the row object next to `timestamp`,
/// so everything except the timestamp deserializes into the value map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSlice {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl SensorSlice {
    pub fn value_for(&self, node_id: &str) -> Option<f64> {
        self.values.get(node_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn test_node_deserializes_wire_shape() {
        let node: SensorNode = serde_json::from_value(json!({
            "nodeId": "node-001",
            "sensors": ["temperature", "pH"],
            "status": "Active",
            "lastSeen": "2025-03-14T09:05:00Z"
        }))
        .unwrap();

        assert_eq!(node.node_id, "node-001");
        assert_eq!(node.sensors, vec!["temperature", "pH"]);
        assert!(node.status.is_active());
        assert_eq!(node.last_seen, Some(ts(9, 5)));
        assert!(node.location.is_none());
    }

    #[test]
    fn test_node_without_last_seen_is_inactive() {
        let node: SensorNode = serde_json::from_value(json!({
            "nodeId": "node-009",
            "sensors": [],
            "status": "Inactive",
            "lastSeen": null
        }))
        .unwrap();

        assert_eq!(node.status, NodeStatus::Inactive);
        assert!(node.last_seen.is_none());
    }

    #[test]
    fn test_reading_null_values_and_missing_anomalies() {
        let reading: Reading = serde_json::from_value(json!({
            "nodeId": "node-001",
            "timestamp": "2025-03-14T09:00:00Z",
            "sensorData": {"temperature": 21.3, "pH": null}
        }))
        .unwrap();

        assert_eq!(reading.value("temperature"), Some(21.3));
        assert_eq!(reading.value("pH"), None);
        assert_eq!(reading.value("turbidity"), None);
        assert!(reading.anomalies.is_empty());
        assert!(!reading.is_anomalous("temperature"));
    }

    #[test]
    fn test_reading_constructor_sets_legacy_flag() {
        let mut data = BTreeMap::new();
        data.insert("temperature".to_string(), Some(95.0));

        let tagged = Reading::new("node-001", ts(9, 5), data.clone(), vec!["temperature".into()]);
        assert_eq!(tagged.anomaly, Some(1));
        assert!(tagged.is_anomalous("temperature"));

        let clean = Reading::new("node-001", ts(9, 0), data, vec![]);
        assert_eq!(clean.anomaly, Some(0));
    }

    #[test]
    fn test_time_range_span() {
        let range: NodeTimeRange = serde_json::from_value(json!({
            "nodeId": "node-001",
            "firstSeen": "2025-03-14T09:00:00Z",
            "lastSeen": "2025-03-14T09:05:00Z"
        }))
        .unwrap();
        assert_eq!(range.span(), Some((ts(9, 0), ts(9, 5))));

        let empty: NodeTimeRange = serde_json::from_value(json!({
            "nodeId": "node-002",
            "firstSeen": null,
            "lastSeen": null
        }))
        .unwrap();
        assert_eq!(empty.span(), None);
    }

    #[test]
    fn test_sensor_slice_flattens_node_columns() {
        let slice: SensorSlice = serde_json::from_value(json!({
            "timestamp": "2025-03-14T09:00:00Z",
            "node-001": 21.3,
            "node-002": 19.8
        }))
        .unwrap();

        assert_eq!(slice.value_for("node-001"), Some(21.3));
        assert_eq!(slice.value_for("node-002"), Some(19.8));
        assert_eq!(slice.value_for("node-003"), None);
    }
}
