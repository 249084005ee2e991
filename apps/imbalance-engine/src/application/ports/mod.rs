//! Port Interfaces
//!
//! Contracts between the aggregation core and its external
//! collaborators. Storage and bar delivery are adapters behind these
//! traits; the pipeline itself never touches a database handle or a
//! channel directly.

use async_trait::async_trait;

use crate::domain::market::{Bar, Trade};

/// Storage failure. Non-fatal to the pipeline: a lost write is logged
/// and the stream continues.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database rejected the operation.
    #[error("database error: {0}")]
    Database(String),

    /// A persisted row could not be mapped back to a domain value.
    #[error("unexpected stored value: {0}")]
    Decode(String),
}

/// Bar delivery failure.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The durable-storage leg failed.
    #[error("bar storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Durable storage for raw trades.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Persist one trade.
    async fn save_trade(&self, trade: &Trade) -> Result<(), StoreError>;
}

/// Durable storage for completed bars.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Persist one bar.
    async fn save_bar(&self, bar: &Bar) -> Result<(), StoreError>;

    /// The most recent `limit` bars, timestamp descending.
    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>, StoreError>;
}

/// Receiver of completed bars.
///
/// A bar handed to the sink is a finished, immutable fact: on failure
/// it is never re-queued into the aggregation state machine, whose
/// state has already been reset by the time the sink runs.
#[async_trait]
pub trait BarSink: Send + Sync {
    /// Deliver one completed bar.
    async fn accept(&self, bar: &Bar) -> Result<(), SinkError>;
}
