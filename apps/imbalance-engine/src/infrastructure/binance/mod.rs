//! Binance Trade Feed
//!
//! WebSocket client for a Binance-style `<symbol>@trade` stream:
//! wire message types, JSON codec, bounded-backoff reconnect policy,
//! and the connection-owning read loop.

/// Wire format types for the trade stream.
pub mod messages;

/// JSON codec for classifying and decoding stream frames.
pub mod codec;

/// Exponential-backoff reconnection policy.
pub mod reconnect;

/// The WebSocket client and connection state tracking.
pub mod client;

pub use client::{ConnectionState, FeedState, TradeStreamClient, TradeStreamConfig};
pub use codec::{CodecError, FeedMessage, JsonCodec};
pub use messages::TradeMessage;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
