//! Stream Client Settings
//!
//! Configuration for the stream client, loaded from environment variables.
//! Numeric values that fail to parse fall back to their defaults; channel
//! names and the buffer size are validated.

use std::time::Duration;

use crate::domain::channel::{Channel, Pair};

/// Production Bitstamp WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "wss://ws.bitstamp.net";

/// Default envelope buffer between the read loop and the consumer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Default channel list.
pub const DEFAULT_CHANNELS: &str = "live_trades_btceur";

/// Connection timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSettings {
    /// Upper bound on establishing the connection.
    pub connect: Duration,
    /// Upper bound on a single frame write.
    pub write: Duration,
    /// Upper bound on the closing handshake and on delivering the final
    /// envelope after cancellation.
    pub close_grace: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            write: Duration::from_secs(5),
            close_grace: Duration::from_millis(2000),
        }
    }
}

/// Complete stream client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Envelope buffer capacity. Always at least 1.
    pub buffer_capacity: usize,
    /// Connection timeouts.
    pub timeouts: TimeoutSettings,
    /// Channels to subscribe to on start.
    pub channels: Vec<Channel>,
    /// Prometheus exporter port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            timeouts: TimeoutSettings::default(),
            channels: vec![Channel::live_trades(Pair::BTC_EUR)],
            metrics_port: 0,
        }
    }
}

impl StreamSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is empty, a channel name is not in the
    /// catalog, or the buffer capacity is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = TimeoutSettings::default();

        let url = match lookup("BITSTAMP_WS_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("BITSTAMP_WS_URL".to_string()));
            }
            Some(url) => url.trim().to_string(),
            None => DEFAULT_WS_URL.to_string(),
        };

        let buffer_capacity = parse_or(&lookup, "BITSTAMP_STREAM_BUFFER", DEFAULT_BUFFER_CAPACITY);
        if buffer_capacity == 0 {
            return Err(ConfigError::ZeroBuffer("BITSTAMP_STREAM_BUFFER".to_string()));
        }

        let timeouts = TimeoutSettings {
            connect: Duration::from_secs(parse_or(
                &lookup,
                "BITSTAMP_CONNECT_TIMEOUT_SECS",
                defaults.connect.as_secs(),
            )),
            write: Duration::from_secs(parse_or(
                &lookup,
                "BITSTAMP_WRITE_TIMEOUT_SECS",
                defaults.write.as_secs(),
            )),
            close_grace: Duration::from_millis(parse_or(
                &lookup,
                "BITSTAMP_CLOSE_GRACE_MS",
                u64::try_from(defaults.close_grace.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        let channels = match lookup("BITSTAMP_CHANNELS") {
            Some(raw) => parse_channels("BITSTAMP_CHANNELS", &raw)?,
            None => parse_channels("BITSTAMP_CHANNELS", DEFAULT_CHANNELS)?,
        };

        let metrics_port = parse_or(&lookup, "BITSTAMP_STREAM_METRICS_PORT", 0);

        Ok(Self {
            url,
            buffer_capacity,
            timeouts,
            channels,
            metrics_port,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    /// Channel name is not in the catalog.
    #[error("unknown channel in {key}: {name}")]
    UnknownChannel {
        /// Variable the name came from.
        key: String,
        /// Offending name.
        name: String,
    },

    /// Buffer capacity must be at least 1.
    #[error("{0} must be at least 1")]
    ZeroBuffer(String),
}

/// Parse a comma separated channel list, dropping blanks and duplicates.
fn parse_channels(key: &str, raw: &str) -> Result<Vec<Channel>, ConfigError> {
    let mut channels: Vec<Channel> = Vec::new();

    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let channel: Channel = name.parse().map_err(|_| ConfigError::UnknownChannel {
            key: key.to_string(),
            name: name.to_string(),
        })?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    if channels.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(channels)
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
