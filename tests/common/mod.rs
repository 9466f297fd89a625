//! Shared wiremock scaffolding for the HTTP integration suites
//!
//! Mounts responses in the backend's wire shapes (camelCase keys,
//! FastAPI-style `detail` error bodies) so every suite talks to the same
//! kind of scripted backend.

#![allow(dead_code)]

use sensorview::client::HttpApiClient;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scripted dashboard backend
pub struct MockBackend {
    pub server: MockServer,
}

impl MockBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Client pointed at this backend with the default timeout
    pub fn client(&self) -> HttpApiClient {
        HttpApiClient::new(Url::parse(&self.server.uri()).unwrap()).unwrap()
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> HttpApiClient {
        HttpApiClient::with_timeout(Url::parse(&self.server.uri()).unwrap(), timeout).unwrap()
    }

    /// Mount a 200 JSON response for a GET route, any query string
    pub async fn mount_json(&self, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a FastAPI-style error body for a GET route
    pub async fn mount_detail_error(&self, route: &str, status: u16, detail: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "detail": detail })))
            .mount(&self.server)
            .await;
    }
}

/// One reading row in the backend's wire shape
pub fn reading_json(
    node_id: &str,
    timestamp: &str,
    values: &[(&str, Value)],
    anomalies: &[&str],
) -> Value {
    let sensor_data: serde_json::Map<String, Value> = values
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    json!({
        "nodeId": node_id,
        "timestamp": timestamp,
        "sensorData": sensor_data,
        "anomalies": anomalies,
        "anomaly": u8::from(!anomalies.is_empty()),
    })
}

/// One node row in the backend's wire shape
pub fn node_json(node_id: &str, sensors: &[&str], status: &str, last_seen: Option<&str>) -> Value {
    json!({
        "nodeId": node_id,
        "sensors": sensors,
        "status": status,
        "lastSeen": last_seen,
    })
}
