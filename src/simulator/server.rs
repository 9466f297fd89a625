//! REST surface of the simulator
//!
//! Serves the same endpoints and error payloads as the production backend,
//! including the FastAPI-style `{"detail": …}` error body and permissive
//! CORS for browser dashboards.

use super::MemoryStore;
use crate::client::ReadingsQuery;
use crate::error::{Result, SensorViewError};
use crate::model::{NodeTimeRange, Reading, SensorNode, SensorSlice, SeriesPoint};
use crate::range::RangeSelector;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Clone)]
struct AppState {
    store: MemoryStore,
}

/// Raw query parameters as they arrive on the wire
#[derive(Debug, Default, Deserialize)]
struct WireQuery {
    range: Option<String>,
    #[serde(rename = "fromNow")]
    from_now: Option<bool>,
    sensor: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl WireQuery {
    fn into_readings_query(self) -> Result<ReadingsQuery> {
        let selector = match self.range.as_deref() {
            Some(range) => Some(RangeSelector::from_wire(range, self.from_now)?),
            None => None,
        };
        Ok(ReadingsQuery {
            selector,
            sensor: self.sensor,
            start: self.start_time,
            end: self.end_time,
        })
    }
}

/// Error-to-response mapping for all handlers
struct ApiError(SensorViewError);

impl From<SensorViewError> for ApiError {
    fn from(err: SensorViewError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            match &self.0 {
                SensorViewError::InvalidInput(_) | SensorViewError::Parsing(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        let detail = match self.0 {
            SensorViewError::NotFound(msg)
            | SensorViewError::InvalidInput(msg)
            | SensorViewError::Parsing(msg) => msg,
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome" }))
}

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<SensorNode>> {
    Json(state.store.nodes(Utc::now()).await)
}

async fn node_readings(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Query(wire): Query<WireQuery>,
) -> std::result::Result<Json<Vec<Reading>>, ApiError> {
    let query = wire.into_readings_query()?;
    let rows = state
        .store
        .node_readings(&node_id, &query, Utc::now())
        .await?;
    Ok(Json(rows))
}

async fn node_anomalies(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Query(wire): Query<WireQuery>,
) -> std::result::Result<Json<Vec<SeriesPoint>>, ApiError> {
    let sensor = wire.sensor.clone().ok_or_else(|| {
        ApiError(SensorViewError::invalid_input(
            "sensor query parameter is required",
        ))
    })?;
    let query = wire.into_readings_query()?;
    let points = state
        .store
        .anomaly_points(&node_id, &sensor, &query, Utc::now())
        .await?;
    Ok(Json(points))
}

async fn node_time_range(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> std::result::Result<Json<NodeTimeRange>, ApiError> {
    Ok(Json(state.store.time_range(&node_id).await?))
}

async fn sensor_series(
    State(state): State<AppState>,
    Path(sensor_key): Path<String>,
    Query(wire): Query<WireQuery>,
) -> std::result::Result<Json<Vec<SensorSlice>>, ApiError> {
    let query = wire.into_readings_query()?;
    let rows = state
        .store
        .sensor_series(&sensor_key, &query, Utc::now())
        .await;
    Ok(Json(rows))
}

/// Assemble the simulator router over a shared store
pub fn router(store: MemoryStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/api/nodes", get(list_nodes))
        .route("/api/nodes/:node_id/readings", get(node_readings))
        .route("/api/nodes/:node_id/anomalies", get(node_anomalies))
        .route("/api/nodes/:node_id/time_range", get(node_time_range))
        .route("/api/data/sensor/:sensor_key", get(sensor_series))
        .layer(cors)
        .with_state(AppState { store })
}

/// Serve on an already-bound listener until the token is cancelled
pub async fn serve_on(
    store: MemoryStore,
    listener: TcpListener,
    token: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|e| SensorViewError::connection(format!("listener has no local addr: {e}")))?;
    info!("🌐 simulator API listening on http://{local}");
    info!("   node list: http://{local}/api/nodes");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| SensorViewError::connection(format!("HTTP server error: {e}")))
}

/// Bind `addr` and serve until the token is cancelled
pub async fn serve(store: MemoryStore, addr: SocketAddr, token: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SensorViewError::connection(format!("failed to bind {addr}: {e}")))?;
    serve_on(store, listener, token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{RangeAnchor, RangePreset};

    #[test]
    fn test_wire_query_conversion() {
        let wire = WireQuery {
            range: Some("latest24h".to_string()),
            from_now: None,
            sensor: Some("pH".to_string()),
            start_time: None,
            end_time: None,
        };
        let query = wire.into_readings_query().unwrap();
        let selector = query.selector.unwrap();
        assert_eq!(selector.preset, RangePreset::LastDay);
        assert_eq!(selector.anchor, RangeAnchor::FromData);
        assert_eq!(query.sensor.as_deref(), Some("pH"));
    }

    #[test]
    fn test_wire_query_rejects_unknown_range() {
        let wire = WireQuery {
            range: Some("48h".to_string()),
            ..WireQuery::default()
        };
        assert!(wire.into_readings_query().is_err());
    }

    #[test]
    fn test_wire_query_without_range_leaves_default_to_store() {
        let wire = WireQuery::default();
        let query = wire.into_readings_query().unwrap();
        assert!(query.selector.is_none());
    }
}
