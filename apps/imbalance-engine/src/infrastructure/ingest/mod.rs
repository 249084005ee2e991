//! Ingest Buffer
//!
//! The bounded FIFO hand-off between the feed client (producer) and
//! the aggregation pipeline (consumer). This is the only shared
//! resource between the two tasks and the backpressure boundary of the
//! whole engine.
//!
//! Backpressure policy: a full buffer **blocks** the producer's push,
//! throttling venue reads instead of dropping trades. The tradeoff
//! (a long stall can cost the venue connection) is deliberate; a
//! drop-oldest policy would need its own loss accounting and is not an
//! equivalent substitute.

use tokio::sync::mpsc;

use crate::domain::market::Trade;

/// Default buffer capacity, sized to absorb feed bursts.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Push failed because the buffer was closed for shutdown.
#[derive(Debug, thiserror::Error)]
#[error("ingest buffer closed")]
pub struct IngestClosed;

/// Bounded FIFO buffer constructor.
///
/// Built once by the pipeline wiring; the two halves are moved into
/// the producer and consumer tasks. FIFO order is preserved: pop order
/// equals push order.
pub struct IngestBuffer;

impl IngestBuffer {
    /// Create a bounded buffer, returning the producer and consumer
    /// halves.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn bounded(capacity: usize) -> (TradePusher, TradePopper) {
        let (tx, rx) = mpsc::channel(capacity);
        (TradePusher { tx }, TradePopper { rx })
    }
}

/// Producer half of the ingest buffer.
///
/// Cloneable so multiple feed sources can fan into one aggregator; the
/// underlying queue is multi-producer safe and ordering within each
/// producer is preserved.
#[derive(Debug, Clone)]
pub struct TradePusher {
    tx: mpsc::Sender<Trade>,
}

impl TradePusher {
    /// Push one trade, waiting for capacity when the buffer is full.
    ///
    /// A blocked push never drops the pending trade; it completes as
    /// soon as the consumer frees a slot.
    ///
    /// # Errors
    ///
    /// Returns [`IngestClosed`] once the consumer has closed the
    /// buffer for shutdown.
    pub async fn push(&self, trade: Trade) -> Result<(), IngestClosed> {
        self.tx.send(trade).await.map_err(|_| IngestClosed)
    }

    /// Whether the consumer has closed the buffer.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the ingest buffer.
#[derive(Debug)]
pub struct TradePopper {
    rx: mpsc::Receiver<Trade>,
}

impl TradePopper {
    /// Pop the next trade in arrival order, waiting when the buffer is
    /// empty. Returns `None` once the buffer is closed and drained.
    pub async fn pop(&mut self) -> Option<Trade> {
        self.rx.recv().await
    }

    /// Close the buffer for further pushes. Already-buffered trades
    /// remain poppable until drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
