//! Aggregation Pipeline
//!
//! The consumer half of the engine: pops trades from the ingest buffer
//! in strict arrival order, persists each trade, feeds it through the
//! imbalance aggregator, and hands emitted bars to the sink.
//!
//! The pipeline owns the aggregator exclusively, so the running sums
//! have a single writer by construction. Storage and sink failures are
//! logged and never stall or reorder consumption.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{BarSink, TradeStore};
use crate::domain::aggregation::{ImbalanceAggregator, ThresholdPolicy};
use crate::domain::market::Trade;
use crate::infrastructure::ingest::TradePopper;
use crate::infrastructure::metrics;

/// The trade-consuming aggregation loop.
pub struct AggregationPipeline<P> {
    popper: TradePopper,
    aggregator: ImbalanceAggregator<P>,
    trade_store: Arc<dyn TradeStore>,
    sink: Arc<dyn BarSink>,
    cancel: CancellationToken,
}

impl<P: ThresholdPolicy> AggregationPipeline<P> {
    /// Create a new pipeline.
    #[must_use]
    pub fn new(
        popper: TradePopper,
        aggregator: ImbalanceAggregator<P>,
        trade_store: Arc<dyn TradeStore>,
        sink: Arc<dyn BarSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            popper,
            aggregator,
            trade_store,
            sink,
            cancel,
        }
    }

    /// Run until the buffer closes or shutdown is requested.
    ///
    /// On shutdown the buffer is closed for further pushes and every
    /// already-buffered trade is drained through the aggregator before
    /// the loop exits. Accumulated-but-unemitted imbalance is
    /// discarded, by design: no partial bar is synthesized.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.popper.close();
                    while let Some(trade) = self.popper.pop().await {
                        self.process(trade).await;
                    }
                    break;
                }
                trade = self.popper.pop() => {
                    match trade {
                        Some(trade) => self.process(trade).await,
                        None => break,
                    }
                }
            }
        }

        let residual = self.aggregator.state();
        if !residual.is_empty() {
            tracing::info!(
                buy_volume = residual.buy_volume,
                sell_volume = residual.sell_volume,
                imbalance = residual.imbalance(),
                "Discarding accumulated imbalance below threshold on shutdown"
            );
        }
        tracing::info!("Aggregation pipeline stopped");
    }

    async fn process(&mut self, trade: Trade) {
        if let Err(e) = self.trade_store.save_trade(&trade).await {
            metrics::record_store_error("trade");
            tracing::error!(error = %e, timestamp = trade.timestamp, "Failed to persist trade");
        }

        if let Some(bar) = self.aggregator.apply(&trade) {
            metrics::record_bar_emitted(bar.dollar_imbalance);
            tracing::info!(
                timestamp = bar.timestamp,
                dollar_imbalance = bar.dollar_imbalance,
                "Imbalance bar emitted"
            );

            // The bar is already a finished fact; a failing sink must
            // not feed back into accumulation.
            if let Err(e) = self.sink.accept(&bar).await {
                tracing::error!(error = %e, timestamp = bar.timestamp, "Bar sink failed");
            }
        }
    }
}
