//! Node registry view: every known node with status and last-seen time

use crate::client::ApiClient;
use crate::error::Result;
use crate::model::SensorNode;
use crate::poll::{PollConfig, Subscription, ViewSource, ViewState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// The registry renders the node list as fetched; nothing is derived
pub type RegistrySnapshot = Vec<SensorNode>;

struct RegistrySource {
    client: Arc<dyn ApiClient>,
}

#[async_trait]
impl ViewSource for RegistrySource {
    type Snapshot = RegistrySnapshot;

    async fn fetch(&self) -> Result<RegistrySnapshot> {
        self.client.nodes().await
    }
}

/// (total, active) counts for a registry snapshot
pub fn registry_stats(nodes: &[SensorNode]) -> (usize, usize) {
    let active = nodes.iter().filter(|n| n.status.is_active()).count();
    (nodes.len(), active)
}

/// Polled list of all nodes
pub struct RegistryView {
    subscription: Subscription<RegistrySnapshot>,
}

impl RegistryView {
    pub fn open(client: Arc<dyn ApiClient>, poll: PollConfig) -> Self {
        let subscription = Subscription::spawn(RegistrySource { client }, poll);
        Self { subscription }
    }

    pub fn state(&self) -> ViewState<RegistrySnapshot> {
        self.subscription.state()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState<RegistrySnapshot>> {
        self.subscription.watch()
    }

    pub fn close(&self) {
        self.subscription.cancel();
    }
}
