//! Application Layer - Pipeline orchestration and port definitions.

/// Port interfaces for storage and bar delivery.
pub mod ports;

/// Fan-out bar sink (storage + live broadcast).
pub mod sink;

/// The trade-consuming aggregation pipeline.
pub mod pipeline;
