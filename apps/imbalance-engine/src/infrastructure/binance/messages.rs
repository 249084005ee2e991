//! Binance Trade Stream Wire Types
//!
//! Wire format types for the raw `<symbol>@trade` stream. Price and
//! quantity arrive as decimal strings to avoid binary floating-point
//! round-trip ambiguity on the wire; they are parsed as
//! [`rust_decimal::Decimal`] and converted to `f64` only at the
//! domain boundary.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "e": "trade",
//!   "E": 1672515782136,
//!   "s": "BTCUSDT",
//!   "t": 12345,
//!   "p": "0.001",
//!   "q": "100",
//!   "T": 1672515782136,
//!   "m": true,
//!   "M": true
//! }
//! ```

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::market::Trade;
use crate::infrastructure::binance::codec::CodecError;

/// A raw trade event from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Event type (always "trade")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time in epoch milliseconds
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Trading pair symbol (e.g. "BTCUSDT")
    #[serde(rename = "s")]
    pub symbol: String,

    /// Venue-assigned trade ID
    #[serde(rename = "t")]
    pub trade_id: u64,

    /// Execution price as a decimal string
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,

    /// Executed quantity as a decimal string
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quantity: Decimal,

    /// Trade time in epoch milliseconds
    #[serde(rename = "T")]
    pub trade_time: i64,

    /// True when the buyer was the maker (the aggressor sold)
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

impl TradeMessage {
    /// Convert to the domain [`Trade`].
    ///
    /// # Errors
    ///
    /// Returns an error if price or quantity is non-positive or not
    /// representable as `f64` — such a message counts as malformed and
    /// is skipped by the caller.
    pub fn to_trade(&self) -> Result<Trade, CodecError> {
        let price = self
            .price
            .to_f64()
            .filter(|p| *p > 0.0)
            .ok_or_else(|| CodecError::InvalidTrade(format!("price {} out of range", self.price)))?;

        let quantity = self
            .quantity
            .to_f64()
            .filter(|q| *q > 0.0)
            .ok_or_else(|| {
                CodecError::InvalidTrade(format!("quantity {} out of range", self.quantity))
            })?;

        Ok(Trade::new(
            price,
            quantity,
            self.trade_time,
            self.is_buyer_maker,
        ))
    }
}

/// Acknowledgement of a stream control request.
///
/// # Wire Format (JSON)
/// ```json
/// {"result": null, "id": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAck {
    /// Result payload; `null` on success
    pub result: Option<serde_json::Value>,

    /// Request ID the ack corresponds to
    pub id: u64,
}
