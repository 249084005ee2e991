#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Imbalance Engine - Dollar Imbalance Bar Aggregator
//!
//! Ingests a live exchange trade stream, accumulates signed dollar
//! volume, and emits a bar whenever the absolute buy/sell imbalance
//! crosses a configured threshold. Bars are persisted and fanned out
//! to live subscribers; an HTTP server exposes recent bars, a chart
//! dashboard, and health endpoints.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure market data types and the imbalance state machine
//!   - `market`: Trade and bar value types
//!   - `aggregation`: Threshold policy and accumulator
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for storage and bar delivery
//!   - `sink`: Fan-out of emitted bars to storage and broadcast
//!   - `pipeline`: The trade-consuming aggregation loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket trade feed client and codec
//!   - `ingest`: Bounded trade buffer between feed and pipeline
//!   - `persistence`: turso-backed and in-memory stores
//!   - `broadcast`: Channel-based bar distribution
//!   - `http`: Dashboard, query, health, and metrics endpoints
//!   - `config`: Environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//! Exchange WS ──► Ingest Buffer ──► Aggregation ──┬──► Storage ──► GET /bars
//!                 (bounded FIFO)     Pipeline     │
//!                                                 └──► Broadcast ──► subscribers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - Core market types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// Domain types
pub use domain::aggregation::{
    FixedThreshold, ImbalanceAggregator, ImbalanceState, ThresholdPolicy,
};
pub use domain::market::{Bar, Trade};

// Application ports and services
pub use application::pipeline::AggregationPipeline;
pub use application::ports::{BarSink, BarStore, SinkError, StoreError, TradeStore};
pub use application::sink::FanOutBarSink;

// Infrastructure config
pub use infrastructure::config::{
    AggregationSettings, ApiKey, ConfigError, EngineConfig, FeedSettings, ServerSettings,
    StorageSettings, WebSocketSettings,
};

// Feed client (for integration tests)
pub use infrastructure::binance::{
    ConnectionState, FeedState, JsonCodec, TradeStreamClient, TradeStreamConfig,
};

// Ingest buffer
pub use infrastructure::ingest::{IngestBuffer, TradePopper, TradePusher};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{BarBroadcastConfig, BarBroadcastHub, SharedBarBroadcastHub};

// HTTP server
pub use infrastructure::http::{HttpServer, HttpServerState, ServerError};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
