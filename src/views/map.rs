//! Map view: last-known or statically assigned node positions

use crate::client::ApiClient;
use crate::error::Result;
use crate::model::{GeoPoint, NodeStatus, SensorNode};
use crate::poll::{PollConfig, Subscription, ViewSource, ViewState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// One placeable marker
#[derive(Debug, Clone, PartialEq)]
pub struct NodePosition {
    pub node_id: String,
    pub location: GeoPoint,
    pub status: NodeStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Markers plus the nodes that cannot be placed
#[derive(Debug, Clone, Default)]
pub struct MapSnapshot {
    pub positions: Vec<NodePosition>,
    /// Nodes with neither a reported nor an assigned location
    pub unplaced: Vec<String>,
}

impl MapSnapshot {
    /// Place each node: a location reported by the backend wins, otherwise
    /// the statically assigned one from configuration is used.
    pub fn derive(nodes: Vec<SensorNode>, assigned: &BTreeMap<String, GeoPoint>) -> Self {
        let mut positions = Vec::new();
        let mut unplaced = Vec::new();
        for node in nodes {
            let location = node.location.or_else(|| assigned.get(&node.node_id).copied());
            match location {
                Some(location) => positions.push(NodePosition {
                    node_id: node.node_id,
                    location,
                    status: node.status,
                    last_seen: node.last_seen,
                }),
                None => unplaced.push(node.node_id),
            }
        }
        Self { positions, unplaced }
    }
}

struct MapSource {
    client: Arc<dyn ApiClient>,
    assigned: BTreeMap<String, GeoPoint>,
}

#[async_trait]
impl ViewSource for MapSource {
    type Snapshot = MapSnapshot;

    async fn fetch(&self) -> Result<MapSnapshot> {
        let nodes = self.client.nodes().await?;
        Ok(MapSnapshot::derive(nodes, &self.assigned))
    }
}

/// Polled map of node positions
pub struct MapView {
    subscription: Subscription<MapSnapshot>,
}

impl MapView {
    pub fn open(
        client: Arc<dyn ApiClient>,
        assigned: BTreeMap<String, GeoPoint>,
        poll: PollConfig,
    ) -> Self {
        let subscription = Subscription::spawn(MapSource { client, assigned }, poll);
        Self { subscription }
    }

    pub fn state(&self) -> ViewState<MapSnapshot> {
        self.subscription.state()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState<MapSnapshot>> {
        self.subscription.watch()
    }

    pub fn close(&self) {
        self.subscription.cancel();
    }
}
