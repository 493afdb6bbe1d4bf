//! Configuration Module
//!
//! Environment-driven settings for the stream client.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_BUFFER_CAPACITY, DEFAULT_CHANNELS, DEFAULT_WS_URL, StreamSettings,
    TimeoutSettings,
};
