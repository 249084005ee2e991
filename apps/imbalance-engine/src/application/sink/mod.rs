//! Fan-Out Bar Sink
//!
//! Delivers completed bars to durable storage and to the live
//! broadcast hub. The two legs fail independently: a storage error
//! does not stop subscribers from seeing the bar and vice versa.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{BarSink, BarStore, SinkError};
use crate::domain::market::Bar;
use crate::infrastructure::broadcast::BarBroadcastHub;
use crate::infrastructure::metrics;

/// Bar sink fanning out to storage and broadcast.
pub struct FanOutBarSink {
    store: Arc<dyn BarStore>,
    hub: Arc<BarBroadcastHub>,
}

impl FanOutBarSink {
    /// Create a new fan-out sink.
    #[must_use]
    pub fn new(store: Arc<dyn BarStore>, hub: Arc<BarBroadcastHub>) -> Self {
        Self { store, hub }
    }
}

#[async_trait]
impl BarSink for FanOutBarSink {
    async fn accept(&self, bar: &Bar) -> Result<(), SinkError> {
        // Broadcast leg first: it cannot fail, only report zero
        // receivers, and must not wait on storage latency.
        if self.hub.send_bar(*bar).is_none() {
            tracing::debug!(timestamp = bar.timestamp, "No live bar subscribers");
        }

        let storage_result = self.store.save_bar(bar).await;
        if let Err(ref e) = storage_result {
            metrics::record_sink_error("storage");
            tracing::error!(
                error = %e,
                timestamp = bar.timestamp,
                "Failed to persist bar"
            );
        }

        storage_result.map_err(SinkError::Storage)
    }
}
