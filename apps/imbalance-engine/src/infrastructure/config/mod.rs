//! Configuration Module
//!
//! Configuration loading for the imbalance engine.

mod settings;

pub use settings::{
    AggregationSettings, ApiKey, ConfigError, EngineConfig, FeedSettings, ServerSettings,
    StorageSettings, WebSocketSettings,
};
