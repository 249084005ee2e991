//! Prometheus Metrics Module
//!
//! Exposes engine metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Ingest**: trades consumed from the feed, decode failures
//! - **Aggregation**: bars emitted and their imbalance magnitudes
//! - **Delivery**: sink and storage failures
//! - **Connection**: feed connection state and reconnect attempts
//!
//! # Integration
//!
//! Metrics are rendered at `/metrics` on the HTTP server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "imbalance_engine_trades_ingested_total",
        "Total trades consumed from the exchange feed"
    );
    describe_counter!(
        "imbalance_engine_decode_errors_total",
        "Total frames that failed to decode into a trade"
    );
    describe_counter!(
        "imbalance_engine_bars_emitted_total",
        "Total imbalance bars emitted"
    );
    describe_histogram!(
        "imbalance_engine_bar_imbalance_dollars",
        "Absolute dollar imbalance of emitted bars"
    );
    describe_counter!(
        "imbalance_engine_sink_errors_total",
        "Total bar delivery failures by leg"
    );
    describe_counter!(
        "imbalance_engine_store_errors_total",
        "Total persistence failures by record type"
    );
    describe_counter!(
        "imbalance_engine_reconnects_total",
        "Total feed reconnection attempts"
    );
    describe_gauge!(
        "imbalance_engine_feed_connected",
        "Whether the feed connection is currently established (0 or 1)"
    );
}

/// Record a trade consumed from the feed.
pub fn record_trade_ingested() {
    counter!("imbalance_engine_trades_ingested_total").increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error() {
    counter!("imbalance_engine_decode_errors_total").increment(1);
}

/// Record an emitted bar and its imbalance magnitude.
pub fn record_bar_emitted(dollar_imbalance: f64) {
    counter!("imbalance_engine_bars_emitted_total").increment(1);
    histogram!("imbalance_engine_bar_imbalance_dollars").record(dollar_imbalance.abs());
}

/// Record a bar delivery failure.
pub fn record_sink_error(leg: &str) {
    counter!(
        "imbalance_engine_sink_errors_total",
        "leg" => leg.to_string()
    )
    .increment(1);
}

/// Record a persistence failure.
pub fn record_store_error(record: &str) {
    counter!(
        "imbalance_engine_store_errors_total",
        "record" => record.to_string()
    )
    .increment(1);
}

/// Record a feed reconnection attempt.
pub fn record_reconnect() {
    counter!("imbalance_engine_reconnects_total").increment(1);
}

/// Update the feed connection gauge.
pub fn set_feed_connected(connected: bool) {
    gauge!("imbalance_engine_feed_connected").set(if connected { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        // The metrics crate drops events when no recorder is
        // installed; none of these should panic.
        record_trade_ingested();
        record_decode_error();
        record_bar_emitted(6000.0);
        record_sink_error("storage");
        record_store_error("trade");
        record_reconnect();
        set_feed_connected(true);
    }
}
