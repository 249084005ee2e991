//! Domain Layer - Core market data types and aggregation logic.
//!
//! This layer contains the pure domain types and the imbalance-bar
//! state machine with no I/O and no external service dependencies.

/// Market data value types (trades, bars).
pub mod market;

/// Dollar imbalance accumulation state machine.
pub mod aggregation;
