//! Mock implementations for testing
//!
//! [`MockApiClient`] speaks the [`ApiClient`] trait over the simulator's
//! in-memory store, so tests get real query semantics without a socket.
//! Failures can be queued ahead of calls to exercise error paths.

use crate::client::{ApiClient, ReadingsQuery};
use crate::error::{Result, SensorViewError};
use crate::model::{NodeTimeRange, Reading, SensorNode, SensorSlice, SeriesPoint};
use crate::range::RangeSelector;
use crate::simulator::MemoryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory [`ApiClient`] for tests
pub struct MockApiClient {
    store: MemoryStore,
    failures: Arc<Mutex<VecDeque<SensorViewError>>>,
    frozen_now: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl MockApiClient {
    /// Create a mock client over an empty store
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Create a mock client over an existing store
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            store,
            failures: Arc::new(Mutex::new(VecDeque::new())),
            frozen_now: Arc::new(Mutex::new(None)),
        }
    }

    /// Direct access to the backing store for seeding
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Pin the clock used for status derivation and range anchoring
    pub async fn freeze_now(&self, now: DateTime<Utc>) {
        *self.frozen_now.lock().await = Some(now);
    }

    /// Queue an error; the next call returns it instead of data
    pub async fn queue_failure(&self, err: SensorViewError) {
        self.failures.lock().await.push_back(err);
    }

    /// Queue several identical connection failures
    pub async fn queue_connection_failures(&self, count: usize) {
        let mut failures = self.failures.lock().await;
        for _ in 0..count {
            failures.push_back(SensorViewError::connection("simulated connection loss"));
        }
    }

    async fn take_failure(&self) -> Result<()> {
        match self.failures.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn now(&self) -> DateTime<Utc> {
        self.frozen_now.lock().await.unwrap_or_else(Utc::now)
    }
}

impl Default for MockApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn nodes(&self) -> Result<Vec<SensorNode>> {
        self.take_failure().await?;
        Ok(self.store.nodes(self.now().await).await)
    }

    async fn readings(&self, node_id: &str, query: &ReadingsQuery) -> Result<Vec<Reading>> {
        self.take_failure().await?;
        self.store
            .node_readings(node_id, query, self.now().await)
            .await
    }

    async fn anomalies(
        &self,
        node_id: &str,
        sensor: &str,
        selector: RangeSelector,
    ) -> Result<Vec<SeriesPoint>> {
        self.take_failure().await?;
        let query = ReadingsQuery::with_selector(selector);
        self.store
            .anomaly_points(node_id, sensor, &query, self.now().await)
            .await
    }

    async fn time_range(&self, node_id: &str) -> Result<NodeTimeRange> {
        self.take_failure().await?;
        self.store.time_range(node_id).await
    }

    async fn sensor_series(
        &self,
        sensor_key: &str,
        selector: RangeSelector,
    ) -> Result<Vec<SensorSlice>> {
        self.take_failure().await?;
        let query = ReadingsQuery::with_selector(selector);
        Ok(self
            .store
            .sensor_series(sensor_key, &query, self.now().await)
            .await)
    }
}
