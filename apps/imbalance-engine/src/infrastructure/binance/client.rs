//! Trade Stream WebSocket Client
//!
//! Connects to the exchange trade stream and forwards decoded trades
//! into the ingest buffer.
//!
//! # Stream URL
//!
//! - Default: `wss://stream.binance.us:9443/ws/btcusdt@trade`
//!
//! # Protocol
//!
//! Frames are JSON objects; trade events carry an `"e":"trade"` tag.
//! The client reconnects with exponential backoff when the connection
//! drops, and treats a silent socket (no frames within the idle
//! timeout) as dead.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, FeedMessage, JsonCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::infrastructure::config::ApiKey;
use crate::infrastructure::ingest::TradePusher;
use crate::infrastructure::metrics;

/// Errors that can occur in the trade stream client.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The ingest buffer consumer is gone.
    #[error("ingest buffer closed")]
    BufferClosed,

    /// No frames arrived within the idle timeout.
    #[error("stream idle for longer than {0:?}")]
    IdleTimeout(Duration),

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,

    /// Connection closed by the server.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Connection lifecycle states, as reported on the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not currently trying.
    Disconnected,
    /// Dialing the stream endpoint.
    Connecting,
    /// Connected and consuming frames.
    Connected,
    /// Waiting out a backoff delay before redialing.
    Reconnecting,
}

impl ConnectionState {
    /// Lowercase label for logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Shared observable state of the feed connection.
///
/// Written by the client, read by the health endpoint.
#[derive(Debug)]
pub struct FeedState {
    state: parking_lot::RwLock<ConnectionState>,
    trades_ingested: AtomicU64,
    reconnect_count: AtomicU32,
    /// Event time of the last ingested trade, millis since epoch.
    /// Zero means no trade has been seen yet.
    last_trade_at_ms: AtomicI64,
}

impl FeedState {
    /// Create state for a feed that has not connected yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(ConnectionState::Disconnected),
            trades_ingested: AtomicU64::new(0),
            reconnect_count: AtomicU32::new(0),
            last_trade_at_ms: AtomicI64::new(0),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Total trades forwarded into the ingest buffer.
    #[must_use]
    pub fn trades_ingested(&self) -> u64 {
        self.trades_ingested.load(Ordering::Relaxed)
    }

    /// Total reconnection attempts since startup.
    #[must_use]
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Event time of the last ingested trade, if any.
    #[must_use]
    pub fn last_trade_at_ms(&self) -> Option<i64> {
        match self.last_trade_at_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    fn set_connection_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        metrics::set_feed_connected(state == ConnectionState::Connected);
    }

    fn record_trade(&self, timestamp_ms: i64) {
        self.trades_ingested.fetch_add(1, Ordering::Relaxed);
        self.last_trade_at_ms.store(timestamp_ms, Ordering::Relaxed);
    }

    fn record_reconnect(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the trade stream client.
#[derive(Debug, Clone)]
pub struct TradeStreamConfig {
    /// WebSocket stream URL.
    pub url: String,
    /// Optional exchange API key, sent as `X-MBX-APIKEY`.
    pub api_key: Option<ApiKey>,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Declare the connection dead after this long without a frame.
    pub idle_timeout: Duration,
}

impl TradeStreamConfig {
    /// Create a configuration with default reconnect and idle settings.
    #[must_use]
    pub fn new(url: String, api_key: Option<ApiKey>) -> Self {
        Self {
            url,
            api_key,
            reconnect: ReconnectConfig::default(),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// WebSocket client for the exchange trade stream.
///
/// Manages the connection lifecycle: dialing, decoding frames,
/// forwarding trades into the ingest buffer, ping/pong upkeep, and
/// automatic reconnection with exponential backoff.
pub struct TradeStreamClient {
    config: TradeStreamConfig,
    codec: JsonCodec,
    pusher: TradePusher,
    state: Arc<FeedState>,
    cancel: CancellationToken,
}

impl TradeStreamClient {
    /// Create a new client writing into the given ingest buffer.
    #[must_use]
    pub fn new(
        config: TradeStreamConfig,
        pusher: TradePusher,
        state: Arc<FeedState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            pusher,
            state,
            cancel,
        }
    }

    /// Run the connection loop until cancelled or the attempt budget is
    /// spent.
    ///
    /// # Errors
    ///
    /// Returns an error when reconnection attempts are exhausted or the
    /// ingest buffer closes while the engine is still running.
    pub async fn run(self: Arc<Self>) -> Result<(), FeedError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("trade stream client cancelled");
                self.state.set_connection_state(ConnectionState::Disconnected);
                return Ok(());
            }

            match self.connect_and_run(&mut policy).await {
                Ok(()) => {
                    tracing::info!("trade stream closed gracefully");
                    self.state.set_connection_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(FeedError::BufferClosed) if self.cancel.is_cancelled() => {
                    // Consumer shut down first during engine shutdown.
                    self.state.set_connection_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(e @ FeedError::BufferClosed) => {
                    self.state.set_connection_state(ConnectionState::Disconnected);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "trade stream connection error");

                    let Some(delay) = policy.next_delay() else {
                        self.state.set_connection_state(ConnectionState::Disconnected);
                        return Err(FeedError::MaxReconnectAttemptsExceeded);
                    };

                    let attempt = policy.attempt_count();
                    self.state.set_connection_state(ConnectionState::Reconnecting);
                    self.state.record_reconnect();
                    metrics::record_reconnect();
                    tracing::info!(attempt, delay_ms = delay.as_millis(), "reconnecting to trade stream");

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("cancelled during reconnect delay");
                            self.state.set_connection_state(ConnectionState::Disconnected);
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Dial the stream and consume frames until error or cancellation.
    async fn connect_and_run(&self, policy: &mut ReconnectPolicy) -> Result<(), FeedError> {
        self.state.set_connection_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "connecting to trade stream");

        let mut request = self.config.url.as_str().into_client_request()?;
        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(key.expose())
                .map_err(|e| FeedError::ConnectionFailed(format!("invalid API key header: {e}")))?;
            request.headers_mut().insert("X-MBX-APIKEY", value);
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        self.state.set_connection_state(ConnectionState::Connected);
        policy.reset();
        tracing::info!("trade stream connected");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = tokio::time::timeout(self.config.idle_timeout, read.next()) => {
                    let Ok(msg) = msg else {
                        tracing::warn!(timeout = ?self.config.idle_timeout, "no frames within idle timeout");
                        return Err(FeedError::IdleTimeout(self.config.idle_timeout));
                    };
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_frame(&text).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("server sent close frame");
                            return Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Pong and binary frames are noise here.
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(FeedError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Decode one text frame and forward any trade it carries.
    ///
    /// Malformed frames are logged and skipped; only a closed ingest
    /// buffer aborts the connection.
    async fn handle_text_frame(&self, text: &str) -> Result<(), FeedError> {
        match self.codec.decode(text) {
            Ok(FeedMessage::Trade(msg)) => match msg.to_trade() {
                Ok(trade) => {
                    self.state.record_trade(trade.timestamp);
                    metrics::record_trade_ingested();
                    self.pusher
                        .push(trade)
                        .await
                        .map_err(|_| FeedError::BufferClosed)?;
                }
                Err(e) => {
                    metrics::record_decode_error();
                    tracing::warn!(error = %e, "skipping invalid trade event");
                }
            },
            Ok(FeedMessage::Ack(ack)) => {
                tracing::debug!(id = ack.id, "control acknowledgement");
            }
            Ok(FeedMessage::Ignored { event }) => {
                tracing::trace!(event = %event, "ignoring event type");
            }
            Err(e) => {
                metrics::record_decode_error();
                tracing::warn!(error = %e, "skipping malformed frame");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ingest::IngestBuffer;

    const TRADE_FRAME: &str = r#"{"e":"trade","E":1672515782136,"s":"BTCUSDT","t":1,"p":"100.5","q":"2","T":1672515782134,"m":false,"M":true}"#;

    fn test_client(pusher: TradePusher) -> TradeStreamClient {
        TradeStreamClient::new(
            TradeStreamConfig::new("wss://example.invalid/ws".to_string(), None),
            pusher,
            Arc::new(FeedState::new()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn feed_state_starts_disconnected() {
        let state = FeedState::new();
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
        assert_eq!(state.trades_ingested(), 0);
        assert!(state.last_trade_at_ms().is_none());
    }

    #[test]
    fn feed_state_tracks_trades() {
        let state = FeedState::new();
        state.record_trade(1_672_515_782_134);
        state.record_trade(1_672_515_782_200);
        assert_eq!(state.trades_ingested(), 2);
        assert_eq!(state.last_trade_at_ms(), Some(1_672_515_782_200));
    }

    #[test]
    fn connection_state_labels() {
        assert_eq!(ConnectionState::Connected.as_str(), "connected");
        assert_eq!(ConnectionState::Reconnecting.as_str(), "reconnecting");
    }

    #[tokio::test]
    async fn trade_frame_lands_in_buffer() {
        let (pusher, mut popper) = IngestBuffer::bounded(8);
        let client = test_client(pusher);

        client.handle_text_frame(TRADE_FRAME).await.unwrap();

        let trade = popper.pop().await.unwrap();
        assert!((trade.price - 100.5).abs() < f64::EPSILON);
        assert!(!trade.is_buyer_maker);
        assert_eq!(client.state.trades_ingested(), 1);
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped_not_fatal() {
        let (pusher, mut popper) = IngestBuffer::bounded(8);
        let client = test_client(pusher);

        client.handle_text_frame("{garbage").await.unwrap();
        client.handle_text_frame(TRADE_FRAME).await.unwrap();

        assert!(popper.pop().await.is_some());
    }

    #[tokio::test]
    async fn invalid_price_is_skipped_not_fatal() {
        let (pusher, mut popper) = IngestBuffer::bounded(8);
        let client = test_client(pusher);

        let zero_price = TRADE_FRAME.replace("100.5", "0");
        client.handle_text_frame(&zero_price).await.unwrap();
        client.handle_text_frame(TRADE_FRAME).await.unwrap();

        let trade = popper.pop().await.unwrap();
        assert!(trade.price > 0.0);
        assert_eq!(client.state.trades_ingested(), 1);
    }

    #[tokio::test]
    async fn closed_buffer_surfaces_as_error() {
        let (pusher, popper) = IngestBuffer::bounded(8);
        drop(popper);
        let client = test_client(pusher);

        let err = client.handle_text_frame(TRADE_FRAME).await.unwrap_err();
        assert!(matches!(err, FeedError::BufferClosed));
    }
}
