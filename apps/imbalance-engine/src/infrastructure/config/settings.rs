//! Engine Configuration Settings
//!
//! Configuration types for the imbalance engine, loaded from
//! environment variables. Every knob has a working default; only the
//! optional exchange API key has no fallback.

use std::time::Duration;

/// Exchange API key, kept out of Debug output.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a non-empty key.
    #[must_use]
    pub const fn new(key: String) -> Self {
        Self(key)
    }

    /// Access the raw key for the request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

/// Trade feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Explicit stream URL override, if any.
    pub url_override: Option<String>,
    /// Lowercase trading pair used to build the default stream URL.
    pub symbol: String,
    /// Optional exchange API key.
    pub api_key: Option<ApiKey>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url_override: None,
            symbol: "btcusdt".to_string(),
            api_key: None,
        }
    }
}

impl FeedSettings {
    /// The WebSocket URL for the raw trade stream.
    #[must_use]
    pub fn stream_url(&self) -> String {
        self.url_override.clone().unwrap_or_else(|| {
            format!("wss://stream.binance.us:9443/ws/{}@trade", self.symbol)
        })
    }
}

/// Aggregation settings.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Dollar imbalance threshold that completes a bar.
    pub threshold: f64,
    /// Capacity of the ingest buffer.
    pub buffer_capacity: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            threshold: 5000.0,
            buffer_capacity: crate::infrastructure::ingest::DEFAULT_CAPACITY,
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Declare the connection dead after this long without a frame.
    pub idle_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port for the dashboard, query, and health endpoints.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Storage settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Path to the local database file.
    pub db_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "imbalance.db".to_string(),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Trade feed settings.
    pub feed: FeedSettings,
    /// Aggregation settings.
    pub aggregation: AggregationSettings,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Storage settings.
    pub storage: StorageSettings,
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable holds a value that cannot be
    /// used, such as an empty API key or a non-positive threshold.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = match std::env::var("BINANCE_API_KEY") {
            Ok(key) if key.is_empty() => {
                return Err(ConfigError::EmptyValue("BINANCE_API_KEY".to_string()));
            }
            Ok(key) => Some(ApiKey::new(key)),
            Err(_) => None,
        };

        let feed = FeedSettings {
            url_override: std::env::var("BINANCE_WS_URL").ok(),
            symbol: std::env::var("TRADE_SYMBOL")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|_| FeedSettings::default().symbol),
            api_key,
        };

        let aggregation = AggregationSettings {
            threshold: parse_env_f64(
                "IMBALANCE_THRESHOLD",
                AggregationSettings::default().threshold,
            ),
            buffer_capacity: parse_env_usize(
                "INGEST_BUFFER_CAPACITY",
                AggregationSettings::default().buffer_capacity,
            ),
        };

        if aggregation.threshold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "IMBALANCE_THRESHOLD".to_string(),
                reason: "threshold must be positive".to_string(),
            });
        }

        if aggregation.buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INGEST_BUFFER_CAPACITY".to_string(),
                reason: "capacity must be at least 1".to_string(),
            });
        }

        let websocket = WebSocketSettings {
            idle_timeout: parse_env_duration_secs(
                "FEED_IDLE_TIMEOUT_SECS",
                WebSocketSettings::default().idle_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "FEED_RECONNECT_DELAY_INITIAL_MS",
                WebSocketSettings::default().reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "FEED_RECONNECT_DELAY_MAX_SECS",
                WebSocketSettings::default().reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "FEED_RECONNECT_DELAY_MULTIPLIER",
                WebSocketSettings::default().reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "FEED_MAX_RECONNECT_ATTEMPTS",
                WebSocketSettings::default().max_reconnect_attempts,
            ),
        };

        let server = ServerSettings {
            http_port: parse_env_u16("ENGINE_HTTP_PORT", ServerSettings::default().http_port),
        };

        let storage = StorageSettings {
            db_path: std::env::var("ENGINE_DB_PATH")
                .unwrap_or_else(|_| StorageSettings::default().db_path),
        };

        Ok(Self {
            feed,
            aggregation,
            websocket,
            server,
            storage,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable holds an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// The offending variable.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
