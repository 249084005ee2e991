//! Infrastructure Layer - Adapters and external integrations.

/// Binance WebSocket trade feed client and codec.
pub mod binance;

/// Bounded producer/consumer hand-off between feed and aggregation.
pub mod ingest;

/// Durable storage adapters for trades and bars.
pub mod persistence;

/// Broadcast channel adapter for live bar subscribers.
pub mod broadcast;

/// HTTP query API, dashboard, and health endpoints.
pub mod http;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
