//! Broadcast Channel Adapter
//!
//! Fan-out of completed bars to live subscribers over a tokio
//! broadcast channel. Slow subscribers lag and lose the oldest
//! messages rather than applying backpressure to the pipeline.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::market::Bar;

/// Completed bar broadcast message.
#[derive(Debug, Clone, Copy)]
pub struct BarBroadcast {
    /// The emitted bar.
    pub bar: Bar,
}

/// Configuration for broadcast channel capacity.
#[derive(Debug, Clone, Copy)]
pub struct BarBroadcastConfig {
    /// Capacity of the bar channel.
    pub bars_capacity: usize,
}

impl Default for BarBroadcastConfig {
    fn default() -> Self {
        Self {
            bars_capacity: 1_000,
        }
    }
}

/// Hub for distributing completed bars to any number of subscribers.
///
/// # Example
///
/// ```rust
/// use imbalance_engine::infrastructure::broadcast::{BarBroadcastConfig, BarBroadcastHub};
///
/// let hub = BarBroadcastHub::new(BarBroadcastConfig::default());
/// let mut rx = hub.bars_rx();
/// // In the pipeline: hub.send_bar(bar);
/// ```
#[derive(Debug)]
pub struct BarBroadcastHub {
    bars_tx: broadcast::Sender<BarBroadcast>,
}

impl BarBroadcastHub {
    /// Create a new hub with the given configuration.
    #[must_use]
    pub fn new(config: BarBroadcastConfig) -> Self {
        Self {
            bars_tx: broadcast::channel(config.bars_capacity).0,
        }
    }

    /// Send a bar to all subscribers.
    ///
    /// Returns the number of receivers that got the message, or `None`
    /// if there are no active receivers.
    #[must_use]
    pub fn send_bar(&self, bar: Bar) -> Option<usize> {
        self.bars_tx.send(BarBroadcast { bar }).ok()
    }

    /// Get a new receiver for completed bars.
    #[must_use]
    pub fn bars_rx(&self) -> broadcast::Receiver<BarBroadcast> {
        self.bars_tx.subscribe()
    }

    /// Number of active bar receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.bars_tx.receiver_count()
    }
}

/// Shared broadcast hub reference.
pub type SharedBarBroadcastHub = Arc<BarBroadcastHub>;
