//! Typed REST client for the dashboard backend
//!
//! All view and report fetches go through the [`ApiClient`] trait so tests
//! can substitute a scripted client. The reqwest-backed implementation maps
//! transport failures and backend error payloads onto the crate error enum,
//! which is what the poll loop consults to decide retryability.

use crate::error::{Result, SensorViewError};
use crate::model::{NodeTimeRange, Reading, SensorNode, SensorSlice, SeriesPoint};
use crate::range::{RangeAnchor, RangeSelector};
use crate::validation::{validate_node_id, validate_sensor_key};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters for `GET /api/nodes/{id}/readings`
///
/// Explicit bounds take precedence over the symbolic selector, mirroring the
/// backend: when `start`/`end` are present the `range`/`fromNow` pair is not
/// sent at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingsQuery {
    pub selector: Option<RangeSelector>,
    /// Restrict readings (and their value maps) to one sensor key
    pub sensor: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadingsQuery {
    /// Query a symbolic window
    pub fn with_selector(selector: RangeSelector) -> Self {
        Self {
            selector: Some(selector),
            ..Self::default()
        }
    }

    /// Query explicit inclusive bounds
    pub fn with_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    /// Restrict to one sensor key
    pub fn sensor(mut self, key: impl Into<String>) -> Self {
        self.sensor = Some(key.into());
        self
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.start.is_some() || self.end.is_some() {
            if let Some(start) = self.start {
                pairs.push(("start_time", rfc3339(start)));
            }
            if let Some(end) = self.end {
                pairs.push(("end_time", rfc3339(end)));
            }
        } else if let Some(selector) = self.selector {
            pairs.push(("range", selector.preset.as_str().to_string()));
            pairs.push(("fromNow", from_now_flag(selector).to_string()));
        }
        if let Some(sensor) = &self.sensor {
            pairs.push(("sensor", sensor.clone()));
        }
        pairs
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn from_now_flag(selector: RangeSelector) -> bool {
    matches!(selector.anchor, RangeAnchor::FromNow)
}

fn selector_pairs(selector: RangeSelector) -> Vec<(&'static str, String)> {
    vec![
        ("range", selector.preset.as_str().to_string()),
        ("fromNow", from_now_flag(selector).to_string()),
    ]
}

/// Read-only access to the dashboard REST surface
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// `GET /api/nodes`
    async fn nodes(&self) -> Result<Vec<SensorNode>>;

    /// `GET /api/nodes/{id}/readings`
    async fn readings(&self, node_id: &str, query: &ReadingsQuery) -> Result<Vec<Reading>>;

    /// `GET /api/nodes/{id}/anomalies`
    #[deprecated(note = "anomaly tags ride on readings now; aggregate with pipeline::aggregate_anomalies")]
    async fn anomalies(
        &self,
        node_id: &str,
        sensor: &str,
        selector: RangeSelector,
    ) -> Result<Vec<SeriesPoint>>;

    /// `GET /api/nodes/{id}/time_range`
    async fn time_range(&self, node_id: &str) -> Result<NodeTimeRange>;

    /// `GET /api/data/sensor/{key}`, one row per timestamp across nodes
    async fn sensor_series(
        &self,
        sensor_key: &str,
        selector: RangeSelector,
    ) -> Result<Vec<SensorSlice>>;
}

/// Backend error payload, FastAPI-style
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// reqwest-backed [`ApiClient`]
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(base_url: Url) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sensorview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                SensorViewError::config(format!(
                    "base URL '{}' cannot carry path segments",
                    self.base_url
                ))
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T>(&self, url: Url, query: &[(&'static str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "GET");
        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(classify_transport_error);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        if status == StatusCode::NOT_FOUND {
            Err(SensorViewError::not_found(detail))
        } else {
            Err(SensorViewError::api(status.as_u16(), detail))
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> SensorViewError {
    if err.is_timeout() {
        SensorViewError::timeout(err.to_string())
    } else if err.is_connect() {
        SensorViewError::connection(err.to_string())
    } else {
        SensorViewError::Http(err)
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn nodes(&self) -> Result<Vec<SensorNode>> {
        let url = self.endpoint(&["api", "nodes"])?;
        self.get_json(url, &[]).await
    }

    async fn readings(&self, node_id: &str, query: &ReadingsQuery) -> Result<Vec<Reading>> {
        validate_node_id(node_id)?;
        if let Some(sensor) = &query.sensor {
            validate_sensor_key(sensor)?;
        }
        let url = self.endpoint(&["api", "nodes", node_id, "readings"])?;
        self.get_json(url, &query.to_pairs()).await
    }

    async fn anomalies(
        &self,
        node_id: &str,
        sensor: &str,
        selector: RangeSelector,
    ) -> Result<Vec<SeriesPoint>> {
        validate_node_id(node_id)?;
        validate_sensor_key(sensor)?;
        let url = self.endpoint(&["api", "nodes", node_id, "anomalies"])?;
        let mut pairs = selector_pairs(selector);
        pairs.push(("sensor", sensor.to_string()));
        self.get_json(url, &pairs).await
    }

    async fn time_range(&self, node_id: &str) -> Result<NodeTimeRange> {
        validate_node_id(node_id)?;
        let url = self.endpoint(&["api", "nodes", node_id, "time_range"])?;
        self.get_json(url, &[]).await
    }

    async fn sensor_series(
        &self,
        sensor_key: &str,
        selector: RangeSelector,
    ) -> Result<Vec<SensorSlice>> {
        validate_sensor_key(sensor_key)?;
        let url = self.endpoint(&["api", "data", "sensor", sensor_key])?;
        self.get_json(url, &selector_pairs(selector)).await
    }
}
