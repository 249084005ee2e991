//! Market Data Types
//!
//! Canonical internal representation of trades and bars. These types
//! are codec-agnostic: decoding from the venue's wire format happens
//! in the infrastructure layer, aggregation happens here.

use serde::{Deserialize, Serialize};

/// A single executed trade reported by the venue.
///
/// Immutable value type. Ownership transfers stage to stage through
/// the pipeline; no stage holds a shared mutable reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    /// Execution price. Positive by the upstream decode contract.
    pub price: f64,
    /// Executed quantity. Positive by the upstream decode contract.
    pub quantity: f64,
    /// Venue timestamp in epoch milliseconds. Monotonicity is not
    /// guaranteed by the feed.
    pub timestamp: i64,
    /// True when the resting order was the buy side, i.e. the
    /// aggressor sold into a standing bid.
    pub is_buyer_maker: bool,
}

impl Trade {
    /// Create a new trade.
    #[must_use]
    pub const fn new(price: f64, quantity: f64, timestamp: i64, is_buyer_maker: bool) -> Self {
        Self {
            price,
            quantity,
            timestamp,
            is_buyer_maker,
        }
    }

    /// Notional dollar value of the trade.
    #[must_use]
    pub fn dollar_value(&self) -> f64 {
        self.price * self.quantity
    }
}

/// A completed dollar imbalance bar.
///
/// Produced exactly once per threshold crossing and immutable from
/// then on: the same value flows to storage, to live subscribers, and
/// out of the query API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Timestamp of the trade that triggered the crossing, epoch
    /// milliseconds.
    pub timestamp: i64,
    /// Absolute buy/sell dollar-volume imbalance at trigger time.
    pub dollar_imbalance: f64,
    /// Always true for threshold-triggered bars. Kept as a field so a
    /// partial/flush bar variant stays representable.
    pub threshold_reached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_value_is_price_times_quantity() {
        let trade = Trade::new(10.0, 5.0, 1_700_000_000_000, false);
        assert!((trade.dollar_value() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bar_fields_survive_round_trip() {
        let bar = Bar {
            timestamp: 1_700_000_000_000,
            dollar_imbalance: 110.0,
            threshold_reached: true,
        };

        let json = serde_json::to_string(&bar).unwrap();
        assert!(json.contains("\"dollar_imbalance\":110.0"));
        assert!(json.contains("\"threshold_reached\":true"));

        let decoded: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, bar);
    }

    #[test]
    fn bar_equality_is_stable_under_repeated_reads() {
        let bar = Bar {
            timestamp: 42,
            dollar_imbalance: 5000.0,
            threshold_reached: true,
        };
        let copy = bar;
        assert_eq!(bar, copy);
        assert_eq!(bar, copy);
    }
}
