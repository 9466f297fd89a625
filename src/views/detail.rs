//! Node detail view: latest values, per-sensor series and anomaly
//! aggregates for one node
//!
//! The whole snapshot is re-derived from the fetched window on every poll;
//! switching range, sensor filter or the anomaly toggle replaces the
//! subscription rather than patching state in place.

use crate::client::{ApiClient, ReadingsQuery};
use crate::error::Result;
use crate::model::{Reading, SeriesPoint};
use crate::pipeline::{
    aggregate_anomalies, latest_values, sensor_key_union, series_for, AnomalySummary,
};
use crate::poll::{PollConfig, Subscription, ViewSource, ViewState};
use crate::range::RangeSelector;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Fetch parameters for one node's detail screen
#[derive(Debug, Clone, PartialEq)]
pub struct DetailParams {
    pub node_id: String,
    pub selector: RangeSelector,
    /// Restrict the window to one sensor key
    pub sensor: Option<String>,
    /// Whether anomaly aggregation is computed at all
    pub show_anomalies: bool,
}

impl DetailParams {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            selector: RangeSelector::default(),
            sensor: None,
            show_anomalies: true,
        }
    }
}

/// Everything the detail screen renders
#[derive(Debug, Clone)]
pub struct DetailSnapshot {
    pub node_id: String,
    /// Raw fetched window, ascending by timestamp
    pub readings: Vec<Reading>,
    /// Union of sensor keys across the whole window, sorted
    pub sensor_keys: Vec<String>,
    /// Most recent non-null value per key
    pub latest: BTreeMap<String, SeriesPoint>,
    /// Chart-ready series per key
    pub series: BTreeMap<String, Vec<SeriesPoint>>,
    /// None while anomaly display is toggled off
    pub anomalies: Option<AnomalySummary>,
}

impl DetailSnapshot {
    /// Derive display state from one fetched window
    pub fn derive(node_id: &str, readings: Vec<Reading>, show_anomalies: bool) -> Self {
        let sensor_keys = sensor_key_union(&readings);
        let latest = latest_values(&readings);
        let series = sensor_keys
            .iter()
            .map(|key| (key.clone(), series_for(&readings, key)))
            .collect();
        let anomalies = show_anomalies.then(|| aggregate_anomalies(&readings));
        Self {
            node_id: node_id.to_string(),
            readings,
            sensor_keys,
            latest,
            series,
            anomalies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

struct DetailSource {
    client: Arc<dyn ApiClient>,
    params: DetailParams,
}

#[async_trait]
impl ViewSource for DetailSource {
    type Snapshot = DetailSnapshot;

    async fn fetch(&self) -> Result<DetailSnapshot> {
        let mut query = ReadingsQuery::with_selector(self.params.selector);
        if let Some(sensor) = &self.params.sensor {
            query = query.sensor(sensor.clone());
        }
        let readings = self.client.readings(&self.params.node_id, &query).await?;
        Ok(DetailSnapshot::derive(
            &self.params.node_id,
            readings,
            self.params.show_anomalies,
        ))
    }
}

/// Polled detail screen for one node
pub struct NodeDetailView {
    client: Arc<dyn ApiClient>,
    params: DetailParams,
    poll: PollConfig,
    subscription: Subscription<DetailSnapshot>,
}

impl NodeDetailView {
    pub fn open(client: Arc<dyn ApiClient>, params: DetailParams, poll: PollConfig) -> Self {
        let subscription = Subscription::spawn(
            DetailSource {
                client: client.clone(),
                params: params.clone(),
            },
            poll,
        );
        Self {
            client,
            params,
            poll,
            subscription,
        }
    }

    pub fn params(&self) -> &DetailParams {
        &self.params
    }

    pub fn state(&self) -> ViewState<DetailSnapshot> {
        self.subscription.state()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState<DetailSnapshot>> {
        self.subscription.watch()
    }

    /// Switch the time window
    pub fn set_range(&mut self, selector: RangeSelector) {
        if self.params.selector == selector {
            return;
        }
        self.params.selector = selector;
        self.restart();
    }

    /// Restrict to one sensor key, or None for all
    pub fn set_sensor(&mut self, sensor: Option<String>) {
        if self.params.sensor == sensor {
            return;
        }
        self.params.sensor = sensor;
        self.restart();
    }

    /// Toggle anomaly aggregation. Turning it off clears aggregation state
    /// outright; turning it back on re-fetches and re-aggregates from the
    /// raw window.
    pub fn set_show_anomalies(&mut self, show: bool) {
        if self.params.show_anomalies == show {
            return;
        }
        self.params.show_anomalies = show;
        self.restart();
    }

    pub fn close(&self) {
        self.subscription.cancel();
    }

    fn restart(&mut self) {
        self.subscription.replace_with(
            DetailSource {
                client: self.client.clone(),
                params: self.params.clone(),
            },
            self.poll,
        );
    }
}
