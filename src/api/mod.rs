//! HTTP query API.
//!
//! Serves the registry listing and sparse time-series query results as
//! JSON for dashboards. Rendering is left to the client.

use crate::core::{AggregationConfig, Result, StatsvisError};
use crate::metrics::{Datapoint, MetricListing, MetricRegistry, SnapshotRing};
use crate::monitoring::{Monitor, PipelineStats};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared read-only handles for the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<MetricRegistry>,
    pub store: Arc<SnapshotRing>,
    pub monitor: Arc<Monitor>,
    pub aggregation: AggregationConfig,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub pipeline: PipelineStats,
    pub snapshots: usize,
    pub capacity: usize,
    pub metric_names: usize,
}

/// Timer percentile and window settings echoed back to clients.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub flush_interval: String,
    pub retention: String,
    pub percentiles: Vec<u32>,
}

/// Response of `GET /api/metrics`.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub listing: MetricListing,
    pub empty: bool,
    pub config: ConfigSummary,
}

/// One chart worth of data.
#[derive(Debug, Serialize)]
pub struct GraphData {
    pub idx: usize,
    pub title: String,
    pub metrics: Vec<String>,
    pub datapoints: Vec<Datapoint>,
}

/// Error response.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

/// Query parameters for `GET /api/graphs`.
#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    /// Comma separated graph selectors, each a `|` separated list of prefixes
    g: Option<String>,
}

/// Build the router for the query API.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/graphs", get(graphs_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the query API on `addr` until the server fails.
pub async fn start_server(addr: SocketAddr, state: ApiState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| StatsvisError::network(format!("Failed to bind web UI to {}: {}", addr, e)))?;
    serve(listener, state).await
}

/// Serve the query API on an already bound listener.
pub async fn serve(listener: TcpListener, state: ApiState) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Web server started");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| StatsvisError::network(format!("API server error: {}", e)))
}

/// GET /health - pipeline counters and store fill level
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.monitor.uptime_seconds(),
        pipeline: state.monitor.stats(),
        snapshots: state.store.len(),
        capacity: state.store.capacity(),
        metric_names: state.registry.len(),
    })
}

/// GET /api/metrics - known names by kind
async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let listing = state.registry.list_by_kind();
    let aggregation = &state.aggregation;
    Json(MetricsResponse {
        empty: listing.is_empty(),
        listing,
        config: ConfigSummary {
            flush_interval: humantime::format_duration(aggregation.flush_interval).to_string(),
            retention: humantime::format_duration(aggregation.retention).to_string(),
            percentiles: aggregation.percentiles.clone(),
        },
    })
}

/// GET /api/graphs?g=a|b,c - one graph per comma separated selector
async fn graphs_handler(State(state): State<ApiState>, Query(params): Query<GraphQuery>) -> Response {
    let selectors = params.g.unwrap_or_default();
    if selectors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "You have an error in your query.".to_string(),
                code: 400,
            }),
        )
            .into_response();
    }

    Json(build_graphs(&state.registry, &state.store, &selectors)).into_response()
}

/// Resolve every graph selector against the registry and query the store.
pub fn build_graphs(
    registry: &MetricRegistry,
    store: &SnapshotRing,
    selectors: &str,
) -> Vec<GraphData> {
    selectors
        .split(',')
        .enumerate()
        .map(|(idx, part)| {
            let prefixes: Vec<&str> = part.split('|').collect();
            let metrics = registry.find_all_by_prefixes(&prefixes);
            let datapoints = store.query_range(&metrics);
            GraphData {
                idx,
                title: graph_title(part),
                metrics,
                datapoints,
            }
        })
        .collect()
}

/// A multi-prefix selector is titled by its first prefix followed by `+`.
fn graph_title(part: &str) -> String {
    match part.find('|') {
        Some(pos) if pos > 0 => format!("{}+", &part[..pos]),
        _ => part.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricKind, Snapshot};
    use chrono::Utc;

    fn state() -> ApiState {
        let registry = Arc::new(MetricRegistry::new());
        registry.record_primary(vec![
            ("api.hits".to_string(), MetricKind::Counter),
            ("api.errors".to_string(), MetricKind::Counter),
            ("load".to_string(), MetricKind::Gauge),
        ]);

        let store = Arc::new(SnapshotRing::new(4));
        let mut snapshot = Snapshot::new(Utc::now());
        snapshot.add("api.hits", 10.0);
        snapshot.add("load", 3.0);
        store.append(snapshot);

        ApiState {
            registry,
            store,
            monitor: Arc::new(Monitor::new()),
            aggregation: AggregationConfig::default(),
        }
    }

    #[test]
    fn test_graph_title() {
        assert_eq!(graph_title("api"), "api");
        assert_eq!(graph_title("api|load"), "api+");
        assert_eq!(graph_title("|load"), "|load");
    }

    #[test]
    fn test_build_graphs() {
        let state = state();
        let graphs = build_graphs(&state.registry, &state.store, "api|load,missing");

        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].idx, 0);
        assert_eq!(graphs[0].title, "api+");
        assert_eq!(graphs[0].metrics, vec!["api.errors", "api.hits", "load"]);
        assert_eq!(graphs[0].datapoints.len(), 1);
        assert_eq!(graphs[0].datapoints[0].values, vec![None, Some(10.0), Some(3.0)]);

        assert_eq!(graphs[1].title, "missing");
        assert!(graphs[1].metrics.is_empty());
        assert!(graphs[1].datapoints.is_empty());
    }

    #[test]
    fn test_datapoint_serializes_missing_as_null() {
        let state = state();
        let graphs = build_graphs(&state.registry, &state.store, "api");
        let json = serde_json::to_value(&graphs[0]).unwrap();
        assert_eq!(json["datapoints"][0]["values"], serde_json::json!([null, 10.0]));
    }

    #[tokio::test]
    async fn test_server_endpoints() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state()));

        let body = http_get(addr, "/api/graphs").await;
        assert!(body.starts_with("HTTP/1.1 400"));

        let body = http_get(addr, "/api/metrics").await;
        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains("\"counters\":[\"api.errors\",\"api.hits\"]"));
        assert!(body.contains("\"percentiles\":[90,95,99]"));

        let body = http_get(addr, "/health").await;
        assert!(body.contains("\"capacity\":4"));
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }
}
