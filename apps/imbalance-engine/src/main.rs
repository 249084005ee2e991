//! Imbalance Engine Binary
//!
//! Starts the dollar imbalance bar engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin imbalance-engine
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `BINANCE_API_KEY`: Exchange API key, sent as `X-MBX-APIKEY`
//! - `BINANCE_WS_URL`: Full stream URL override
//! - `TRADE_SYMBOL`: Trading pair for the default URL (default: btcusdt)
//! - `IMBALANCE_THRESHOLD`: Dollar threshold per bar (default: 5000)
//! - `INGEST_BUFFER_CAPACITY`: Trade buffer capacity (default: 1000)
//! - `ENGINE_HTTP_PORT`: Dashboard/health port (default: 8080)
//! - `ENGINE_DB_PATH`: Database file path (default: imbalance.db)
//! - `FEED_IDLE_TIMEOUT_SECS`: Silent-socket timeout (default: 30)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: imbalance-engine)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use imbalance_engine::infrastructure::binance::{
    FeedState, ReconnectConfig, TradeStreamClient, TradeStreamConfig,
};
use imbalance_engine::infrastructure::persistence::TursoStore;
use imbalance_engine::infrastructure::telemetry;
use imbalance_engine::{
    AggregationPipeline, BarBroadcastConfig, BarBroadcastHub, EngineConfig, FanOutBarSink,
    FixedThreshold, HttpServer, HttpServerState, ImbalanceAggregator, IngestBuffer, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting imbalance engine");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = EngineConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Open storage and provision the schema
    let store = Arc::new(TursoStore::open(&config.storage.db_path).await?);
    store.init_schema().await?;

    // Broadcast hub for live bar subscribers
    let hub = Arc::new(BarBroadcastHub::new(BarBroadcastConfig::default()));

    // Bounded hand-off between the feed and the pipeline
    let (pusher, popper) = IngestBuffer::bounded(config.aggregation.buffer_capacity);

    // Aggregation pipeline
    let aggregator = ImbalanceAggregator::new(FixedThreshold::new(config.aggregation.threshold));
    let sink = Arc::new(FanOutBarSink::new(store.clone(), Arc::clone(&hub)));
    let pipeline = AggregationPipeline::new(
        popper,
        aggregator,
        store.clone(),
        sink,
        shutdown_token.clone(),
    );
    let pipeline_handle = tokio::spawn(pipeline.run());

    // Trade stream client
    let feed_state = Arc::new(FeedState::new());
    let stream_config = TradeStreamConfig {
        url: config.feed.stream_url(),
        api_key: config.feed.api_key.clone(),
        reconnect: ReconnectConfig::from_websocket_settings(&config.websocket),
        idle_timeout: config.websocket.idle_timeout,
    };
    let client = Arc::new(TradeStreamClient::new(
        stream_config,
        pusher,
        Arc::clone(&feed_state),
        shutdown_token.clone(),
    ));
    tokio::spawn(async move {
        if let Err(e) = client.run().await {
            tracing::error!(error = %e, "Trade stream client error");
        }
    });

    // HTTP server (dashboard, query, health, metrics)
    let http_state = Arc::new(HttpServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&feed_state),
        Arc::clone(&hub),
        store,
    ));
    let http_server = HttpServer::new(config.server.http_port, http_state, shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!("Imbalance engine ready");

    await_shutdown(shutdown_token).await;

    // Let the pipeline drain the buffer before exiting
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, pipeline_handle)
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Pipeline did not drain within shutdown timeout"
        );
    }

    tracing::info!("Imbalance engine stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        symbol = %config.feed.symbol,
        threshold = config.aggregation.threshold,
        buffer_capacity = config.aggregation.buffer_capacity,
        http_port = config.server.http_port,
        db_path = %config.storage.db_path,
        "Configuration loaded"
    );
    tracing::debug!(stream_url = %config.feed.stream_url(), "WebSocket endpoint");
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
