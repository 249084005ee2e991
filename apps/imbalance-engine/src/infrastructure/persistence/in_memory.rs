//! In-Memory Storage Adapter
//!
//! Vec-backed implementation of the storage ports for tests. Supports
//! injected write failures so callers can exercise error paths.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::application::ports::{BarStore, StoreError, TradeStore};
use crate::domain::market::{Bar, Trade};

/// In-memory trade and bar store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    trades: RwLock<Vec<Trade>>,
    bars: RwLock<Vec<Bar>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored trades.
    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.trades.read().len()
    }

    /// Number of stored bars.
    #[must_use]
    pub fn bar_count(&self) -> usize {
        self.bars.read().len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TradeStore for InMemoryStore {
    async fn save_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.check_writable()?;
        self.trades.write().push(*trade);
        Ok(())
    }
}

#[async_trait]
impl BarStore for InMemoryStore {
    async fn save_bar(&self, bar: &Bar) -> Result<(), StoreError> {
        self.check_writable()?;
        self.bars.write().push(*bar);
        Ok(())
    }

    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>, StoreError> {
        let mut bars = self.bars.read().clone();
        bars.sort_by_key(|b| std::cmp::Reverse(b.timestamp));
        bars.truncate(limit);
        Ok(bars)
    }
}
