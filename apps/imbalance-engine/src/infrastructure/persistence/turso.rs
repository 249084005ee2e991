//! Turso Storage Adapter
//!
//! SQLite-compatible persistence for trades and bars via turso. The
//! store owns a single database handle; connections are cheap and
//! opened per operation.
//!
//! Schema is provisioned on startup with `CREATE TABLE IF NOT EXISTS`
//! so restarts against an existing file keep their history.

use async_trait::async_trait;
use turso::{Builder, Database, Value};

use crate::application::ports::{BarStore, StoreError, TradeStore};
use crate::domain::market::{Bar, Trade};

/// Trade and bar persistence backed by a local turso database.
pub struct TursoStore {
    db: Database,
}

impl TursoStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self { db })
    }

    /// Create the trades and bars tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if schema provisioning fails.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                price REAL NOT NULL,
                quantity REAL NOT NULL,
                timestamp INTEGER NOT NULL,
                is_buyer_maker INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                dollar_imbalance REAL NOT NULL,
                threshold_reached INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("storage schema ready");
        Ok(())
    }

    fn connect(&self) -> Result<turso::Connection, StoreError> {
        self.db
            .connect()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl TradeStore for TursoStore {
    async fn save_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO trades (price, quantity, timestamp, is_buyer_maker)
             VALUES (?1, ?2, ?3, ?4)",
            (
                trade.price,
                trade.quantity,
                trade.timestamp,
                i64::from(trade.is_buyer_maker),
            ),
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BarStore for TursoStore {
    async fn save_bar(&self, bar: &Bar) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO bars (timestamp, dollar_imbalance, threshold_reached)
             VALUES (?1, ?2, ?3)",
            (
                bar.timestamp,
                bar.dollar_imbalance,
                i64::from(bar.threshold_reached),
            ),
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>, StoreError> {
        let conn = self.connect()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = conn
            .query(
                "SELECT timestamp, dollar_imbalance, threshold_reached
                 FROM bars ORDER BY timestamp DESC LIMIT ?1",
                (limit,),
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut bars = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            bars.push(bar_from_row(&row)?);
        }
        Ok(bars)
    }
}

fn bar_from_row(row: &turso::Row) -> Result<Bar, StoreError> {
    let timestamp = match row
        .get_value(0)
        .map_err(|e| StoreError::Decode(e.to_string()))?
    {
        Value::Integer(ts) => ts,
        other => return Err(StoreError::Decode(format!("bar timestamp: {other:?}"))),
    };
    let dollar_imbalance = match row
        .get_value(1)
        .map_err(|e| StoreError::Decode(e.to_string()))?
    {
        Value::Real(v) => v,
        Value::Integer(v) => {
            #[allow(clippy::cast_precision_loss)]
            {
                v as f64
            }
        }
        other => return Err(StoreError::Decode(format!("bar imbalance: {other:?}"))),
    };
    let threshold_reached = match row
        .get_value(2)
        .map_err(|e| StoreError::Decode(e.to_string()))?
    {
        Value::Integer(v) => v != 0,
        other => return Err(StoreError::Decode(format!("bar flag: {other:?}"))),
    };

    Ok(Bar {
        timestamp,
        dollar_imbalance,
        threshold_reached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> TursoStore {
        let store = TursoStore::open(":memory:").await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn schema_provisioning_is_idempotent() {
        let store = memory_store().await;
        store.init_schema().await.unwrap();
    }

    #[tokio::test]
    async fn saves_and_reads_back_bars_newest_first() {
        let store = memory_store().await;

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

        let bars = store.recent_bars(50).await.unwrap();
        let stamps: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
        assert!(bars[0].threshold_reached);
    }

    #[tokio::test]
    async fn recent_bars_honors_limit() {
        let store = memory_store().await;
        for ts in 0..10_i64 {
            store
                .save_bar(&Bar {
                    timestamp: ts,
                    dollar_imbalance: 7000.0,
                    threshold_reached: true,
                })
                .await
                .unwrap();
        }

        let bars = store.recent_bars(3).await.unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, 9);
    }

    #[tokio::test]
    async fn saves_trades() {
        let store = memory_store().await;
        let trade = Trade::new(100.5, 2.0, 1_672_515_782_134, false);
        store.save_trade(&trade).await.unwrap();
    }
}
