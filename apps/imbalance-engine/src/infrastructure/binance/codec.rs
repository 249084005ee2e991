//! Stream Codec
//!
//! Classifies and decodes raw text frames from the trade stream. A
//! frame is either a trade event, a control acknowledgement, an event
//! type we do not consume, or malformed. Malformed frames surface as
//! [`CodecError`] so the client can log and skip them — a single
//! poison message must never terminate the stream.

use crate::infrastructure::binance::messages::{ControlAck, TradeMessage};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame parsed but is not a recognizable stream message.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Trade event carried out-of-range values.
    #[error("invalid trade: {0}")]
    InvalidTrade(String),
}

/// A decoded stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// A trade event.
    Trade(TradeMessage),
    /// Acknowledgement of a control request.
    Ack(ControlAck),
    /// An event type this engine does not consume.
    Ignored {
        /// The wire event type (e.g. "aggTrade").
        event: String,
    },
}

/// JSON codec for the trade stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into a [`FeedMessage`].
    ///
    /// Event frames carry their type in the `e` field; control
    /// acknowledgements carry a `result`/`id` pair instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON or matches no
    /// known shape.
    pub fn decode(&self, text: &str) -> Result<FeedMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text.trim())?;

        if let Some(event) = value.get("e").and_then(|v| v.as_str()) {
            if event == "trade" {
                let msg: TradeMessage = serde_json::from_value(value)?;
                return Ok(FeedMessage::Trade(msg));
            }
            return Ok(FeedMessage::Ignored {
                event: event.to_string(),
            });
        }

        if value.get("result").is_some() && value.get("id").is_some() {
            let ack: ControlAck = serde_json::from_value(value)?;
            return Ok(FeedMessage::Ack(ack));
        }

        let preview: String = text.chars().take(50).collect();
        Err(CodecError::InvalidFormat(format!(
            "frame has neither event type nor control id: {preview}..."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRADE_FRAME: &str = r#"{"e":"trade","E":1672515782136,"s":"BTCUSDT","t":1,"p":"100.5","q":"2","T":1672515782134,"m":true,"M":true}"#;

    #[test]
    fn decodes_trade_frame() {
        let codec = JsonCodec::new();
        match codec.decode(TRADE_FRAME).unwrap() {
            FeedMessage::Trade(msg) => {
                assert_eq!(msg.symbol, "BTCUSDT");
                assert!(msg.is_buyer_maker);
            }
            other => panic!("expected trade, got {other:?}"),
        }
    }

    #[test]
    fn decodes_control_ack() {
        let codec = JsonCodec::new();
        match codec.decode(r#"{"result":null,"id":7}"#).unwrap() {
            FeedMessage::Ack(ack) => assert_eq!(ack.id, 7),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_ignored_not_an_error() {
        let codec = JsonCodec::new();
        match codec.decode(r#"{"e":"aggTrade","E":1,"s":"BTCUSDT"}"#).unwrap() {
            FeedMessage::Ignored { event } => assert_eq!(event, "aggTrade"),
            other => panic!("expected ignored, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode("not json at all"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn trade_frame_with_garbage_fields_is_an_error() {
        let codec = JsonCodec::new();
        let frame = r#"{"e":"trade","E":1,"s":"BTCUSDT","t":1,"p":"not-a-number","q":"2","T":1,"m":true}"#;
        assert!(codec.decode(frame).is_err());
    }

    #[test]
    fn unrecognized_object_is_an_error() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode(r#"{"hello":"world"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
    }
}
