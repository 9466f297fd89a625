//! Dashboard summary view: one sensor key charted across all nodes

use crate::client::ApiClient;
use crate::error::Result;
use crate::model::{SensorSlice, SeriesPoint};
use crate::poll::{PollConfig, Subscription, ViewSource, ViewState};
use crate::range::RangeSelector;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Fetch parameters for the cross-node summary
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryParams {
    pub sensor_key: String,
    pub selector: RangeSelector,
}

impl SummaryParams {
    pub fn new(sensor_key: impl Into<String>) -> Self {
        Self {
            sensor_key: sensor_key.into(),
            selector: RangeSelector::default(),
        }
    }
}

/// Per-node chart series for one sensor key
#[derive(Debug, Clone)]
pub struct SummarySnapshot {
    pub sensor_key: String,
    /// Node ids observed anywhere in the window, sorted
    pub node_ids: Vec<String>,
    pub per_node: BTreeMap<String, Vec<SeriesPoint>>,
}

impl SummarySnapshot {
    /// Regroup timestamp-keyed rows into per-node series
    pub fn derive(sensor_key: &str, slices: Vec<SensorSlice>) -> Self {
        let mut per_node: BTreeMap<String, Vec<SeriesPoint>> = BTreeMap::new();
        for slice in &slices {
            for (node_id, value) in &slice.values {
                per_node
                    .entry(node_id.clone())
                    .or_default()
                    .push(SeriesPoint::new(slice.timestamp, *value));
            }
        }
        let node_ids = per_node.keys().cloned().collect();
        Self {
            sensor_key: sensor_key.to_string(),
            node_ids,
            per_node,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_node.is_empty()
    }
}

struct SummarySource {
    client: Arc<dyn ApiClient>,
    params: SummaryParams,
}

#[async_trait]
impl ViewSource for SummarySource {
    type Snapshot = SummarySnapshot;

    async fn fetch(&self) -> Result<SummarySnapshot> {
        let slices = self
            .client
            .sensor_series(&self.params.sensor_key, self.params.selector)
            .await?;
        Ok(SummarySnapshot::derive(&self.params.sensor_key, slices))
    }
}

/// Polled cross-node summary for one sensor key
pub struct SummaryView {
    client: Arc<dyn ApiClient>,
    params: SummaryParams,
    poll: PollConfig,
    subscription: Subscription<SummarySnapshot>,
}

impl SummaryView {
    pub fn open(client: Arc<dyn ApiClient>, params: SummaryParams, poll: PollConfig) -> Self {
        let subscription = Subscription::spawn(
            SummarySource {
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

    pub fn params(&self) -> &SummaryParams {
        &self.params
    }

    pub fn state(&self) -> ViewState<SummarySnapshot> {
        self.subscription.state()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState<SummarySnapshot>> {
        self.subscription.watch()
    }

    pub fn set_range(&mut self, selector: RangeSelector) {
        if self.params.selector == selector {
            return;
        }
        self.params.selector = selector;
        self.subscription.replace_with(
            SummarySource {
                client: self.client.clone(),
                params: self.params.clone(),
            },
            self.poll,
        );
    }

    pub fn close(&self) {
        self.subscription.cancel();
    }
}
