//! HTTP Server
//!
//! Serves the dashboard, the bar query endpoint, health checks, and
//! Prometheus metrics on a single port.
//!
//! # Endpoints
//!
//! - `GET /` - Dashboard page charting recent imbalance bars
//! - `GET /bars` - Most recent bars as JSON, newest first
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (checks the feed connection)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::response::Html;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::BarStore;
use crate::infrastructure::binance::{ConnectionState, FeedState};
use crate::infrastructure::broadcast::SharedBarBroadcastHub;
use crate::infrastructure::metrics::get_metrics_handle;

/// Bars returned by `GET /bars`.
const RECENT_BARS_LIMIT: usize = 50;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "unhealthy".
    pub status: HealthStatus,
    /// Engine version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed connection status.
    pub feed: FeedInfo,
    /// Number of live bar subscribers.
    pub broadcast_receivers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The feed is connected and trades are flowing.
    Healthy,
    /// The feed is down or still connecting.
    Unhealthy,
}

/// Feed connection status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state label.
    pub state: String,
    /// Whether the feed is connected.
    pub connected: bool,
    /// Trades consumed from the feed.
    pub trades_ingested: u64,
    /// Reconnection attempts since startup.
    pub reconnect_attempts: u32,
    /// Event time of the last ingested trade, millis since epoch.
    pub last_trade_at_ms: Option<i64>,
}

/// Shared state for the HTTP server.
pub struct HttpServerState {
    version: String,
    started_at: Instant,
    feed: Arc<FeedState>,
    hub: SharedBarBroadcastHub,
    bar_store: Arc<dyn BarStore>,
}

impl HttpServerState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        version: String,
        feed: Arc<FeedState>,
        hub: SharedBarBroadcastHub,
        bar_store: Arc<dyn BarStore>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            feed,
            hub,
            bar_store,
        }
    }
}

/// The engine's HTTP server.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpServerState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server encounters a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn router(state: Arc<HttpServerState>) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/bars", get(bars_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn bars_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    match state.bar_store.recent_bars(RECENT_BARS_LIMIT).await {
        Ok(bars) => (StatusCode::OK, Json(bars)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to query recent bars");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to query bars" })),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    if state.feed.connection_state() == ConnectionState::Connected {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HttpServerState) -> HealthResponse {
    let connection_state = state.feed.connection_state();
    let connected = connection_state == ConnectionState::Connected;

    HealthResponse {
        status: if connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed: FeedInfo {
            state: connection_state.as_str().to_string(),
            connected,
            trades_ingested: state.feed.trades_ingested(),
            reconnect_attempts: state.feed.reconnect_count(),
            last_trade_at_ms: state.feed.last_trade_at_ms(),
        },
        broadcast_receivers: state.hub.receiver_count(),
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Dollar Imbalance Dashboard</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
</head>
<body>
    <h1>Dollar Imbalance Bars</h1>
    <canvas id="chart" width="800" height="400"></canvas>
    <script>
        async function fetchBars() {
            const response = await fetch('/bars');
            return response.json();
        }

        async function renderChart() {
            const bars = await fetchBars();
            const labels = bars.map(bar => new Date(bar.timestamp).toLocaleTimeString());
            const data = bars.map(bar => bar.dollar_imbalance);

            new Chart(document.getElementById('chart').getContext('2d'), {
                type: 'bar',
                data: {
                    labels: labels,
                    datasets: [{
                        label: 'Dollar Imbalance',
                        data: data,
                        backgroundColor: 'rgba(75, 192, 192, 0.2)',
                        borderColor: 'rgba(75, 192, 192, 1)',
                        borderWidth: 1
                    }]
                },
                options: {
                    scales: {
                        y: { beginAtZero: true }
                    }
                }
            });
        }

        renderChart();
        setInterval(renderChart, 5000); // Refresh every 5 seconds
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::domain::market::Bar;
    use crate::infrastructure::broadcast::{BarBroadcastConfig, BarBroadcastHub};
    use crate::infrastructure::persistence::InMemoryStore;

    async fn seeded_state() -> (Arc<HttpServerState>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        for ts in [100_i64, 300, 200] {
            store
                .save_bar(&Bar {
                    timestamp: ts,
                    dollar_imbalance: 6000.0,
                    threshold_reached: true,
                })
                .await
                .unwrap();
        }

        let state = Arc::new(HttpServerState::new(
            "test".to_string(),
            Arc::new(FeedState::new()),
            Arc::new(BarBroadcastHub::new(BarBroadcastConfig::default())),
            store.clone(),
        ));
        (state, store)
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn bars_endpoint_returns_newest_first() {
        let (state, _store) = seeded_state().await;
        let response = router(state)
            .oneshot(Request::builder().uri("/bars").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bars: Vec<Bar> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        let stamps: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn dashboard_serves_chart_page() {
        let (state, _store) = seeded_state().await;
        let response = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("Dollar Imbalance Bars"));
        assert!(body.contains("chart.js"));
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let (state, _store) = seeded_state().await;
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_reflects_feed_connection() {
        let (state, _store) = seeded_state().await;
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/readyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // The feed never connected in this test.
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_feed_and_subscribers() {
        let (state, _store) = seeded_state().await;
        let _rx = state.hub.bars_rx();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["feed"]["state"], "disconnected");
        assert_eq!(json["broadcast_receivers"], 1);
    }
}
