//! End-to-end pipeline tests
//!
//! Exercise the engine from raw stream frames through the codec,
//! ingest buffer, and aggregation pipeline to storage and broadcast,
//! without a network connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use imbalance_engine::infrastructure::binance::{FeedMessage, JsonCodec};
use imbalance_engine::infrastructure::persistence::InMemoryStore;
use imbalance_engine::{
    AggregationPipeline, Bar, BarBroadcastConfig, BarBroadcastHub, BarStore, FanOutBarSink,
    FixedThreshold, ImbalanceAggregator, IngestBuffer, Trade,
};

fn trade_frame(price: &str, quantity: &str, timestamp: i64, is_buyer_maker: bool) -> String {
    format!(
        r#"{{"e":"trade","E":{e},"s":"BTCUSDT","t":1,"p":"{price}","q":"{quantity}","T":{timestamp},"m":{is_buyer_maker},"M":true}}"#,
        e = timestamp + 2,
    )
}

/// Decode frames the way the feed client does: trades pass through,
/// everything else is skipped.
fn decode_trades(codec: &JsonCodec, frames: &[String]) -> Vec<Trade> {
    frames
        .iter()
        .filter_map(|frame| match codec.decode(frame) {
            Ok(FeedMessage::Trade(msg)) => msg.to_trade().ok(),
            _ => None,
        })
        .collect()
}

/// Feed the same trades directly through a standalone aggregator to
/// get the expected bar sequence.
fn reference_bars(trades: &[Trade], threshold: f64) -> Vec<Bar> {
    let mut aggregator = ImbalanceAggregator::new(FixedThreshold::new(threshold));
    trades
        .iter()
        .filter_map(|trade| aggregator.apply(trade))
        .collect()
}

#[tokio::test]
async fn pipeline_matches_direct_aggregation() {
    let frames: Vec<String> = vec![
        trade_frame("100.0", "10.0", 1, false), // +1000 buy
        trade_frame("100.0", "8.0", 2, true),   // +800 sell
        trade_frame("200.0", "20.0", 3, false), // +4000 buy -> |4200| still < 5000
        trade_frame("100.0", "12.0", 4, false), // +1200 buy -> emits
        trade_frame("50.0", "200.0", 5, true),  // +10000 sell -> emits
    ];
    let codec = JsonCodec::new();
    let trades = decode_trades(&codec, &frames);
    assert_eq!(trades.len(), 5);

    let expected = reference_bars(&trades, 5000.0);
    assert_eq!(expected.len(), 2);

    let (pusher, popper) = IngestBuffer::bounded(16);
    let store = Arc::new(InMemoryStore::new());
    let hub = Arc::new(BarBroadcastHub::new(BarBroadcastConfig::default()));
    let mut bar_rx = hub.bars_rx();
    let sink = Arc::new(FanOutBarSink::new(store.clone(), hub));

    let pipeline = AggregationPipeline::new(
        popper,
        ImbalanceAggregator::new(FixedThreshold::new(5000.0)),
        store.clone(),
        sink,
        CancellationToken::new(),
    );
    let handle = tokio::spawn(pipeline.run());

    for trade in &trades {
        pusher.push(*trade).await.unwrap();
    }
    drop(pusher);
    handle.await.unwrap();

    // Every trade was persisted in arrival order.
    assert_eq!(store.trade_count(), trades.len());

    // The pipeline emitted exactly the bars direct aggregation yields.
    let mut stored = store.recent_bars(50).await.unwrap();
    stored.sort_by_key(|b| b.timestamp);
    assert_eq!(stored, expected);

    // Live subscribers saw the same bars in emission order.
    for bar in &expected {
        let received = bar_rx.recv().await.unwrap();
        assert_eq!(received.bar, *bar);
    }
}

#[tokio::test]
async fn malformed_frames_do_not_break_the_stream() {
    let codec = JsonCodec::new();
    let frames = vec![
        trade_frame("100.0", "30.0", 1, false),
        "not json".to_string(),
        r#"{"e":"trade","E":2,"s":"BTCUSDT","t":2,"p":"oops","q":"1","T":2,"m":false}"#.to_string(),
        r#"{"e":"aggTrade","E":3,"s":"BTCUSDT"}"#.to_string(),
        r#"{"result":null,"id":1}"#.to_string(),
        trade_frame("100.0", "30.0", 6, false),
    ];

    // Only the two valid trade frames survive decoding.
    let trades = decode_trades(&codec, &frames);
    assert_eq!(trades.len(), 2);

    let (pusher, popper) = IngestBuffer::bounded(16);
    let store = Arc::new(InMemoryStore::new());
    let hub = Arc::new(BarBroadcastHub::new(BarBroadcastConfig::default()));
    let sink = Arc::new(FanOutBarSink::new(store.clone(), hub));

    let pipeline = AggregationPipeline::new(
        popper,
        ImbalanceAggregator::new(FixedThreshold::new(5000.0)),
        store.clone(),
        sink,
        CancellationToken::new(),
    );
    let handle = tokio::spawn(pipeline.run());

    for trade in &trades {
        pusher.push(*trade).await.unwrap();
    }
    drop(pusher);
    handle.await.unwrap();

    // 3000 + 3000 buy dollars from the valid frames crossed 5000.
    let bars = store.recent_bars(50).await.unwrap();
    assert_eq!(bars.len(), 1);
    assert!(bars[0].threshold_reached);
    assert_eq!(bars[0].timestamp, 6);
}

#[tokio::test]
async fn backpressure_preserves_arrival_order() {
    // Capacity 2 forces the producer to block repeatedly; every trade
    // must still come out, in order.
    let (pusher, popper) = IngestBuffer::bounded(2);
    let store = Arc::new(InMemoryStore::new());
    let hub = Arc::new(BarBroadcastHub::new(BarBroadcastConfig::default()));
    let sink = Arc::new(FanOutBarSink::new(store.clone(), hub));

    let pipeline = AggregationPipeline::new(
        popper,
        ImbalanceAggregator::new(FixedThreshold::new(1000.0)),
        store.clone(),
        sink,
        CancellationToken::new(),
    );
    let handle = tokio::spawn(pipeline.run());

    let producer = tokio::spawn(async move {
        for i in 0..100_i64 {
            let trade = Trade::new(10.0, 1.0, i, i % 2 == 0);
            pusher.push(trade).await.unwrap();
        }
    });

    producer.await.unwrap();
    handle.await.unwrap();

    assert_eq!(store.trade_count(), 100);
}
