#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Bitstamp Stream - Market Data Streaming Client
//!
//! Connects to Bitstamp's v2 WebSocket API, subscribes to trade, order and
//! order book channels, and delivers every inbound frame to one consumer as
//! an ordered stream of decoded envelopes.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Channel catalog, payload types and the subscription registry
//!   - `channel`: pairs, channel families and channel names
//!   - `streaming`: typed payloads and the envelope
//!   - `subscription`: active subscription tracking
//!
//! - **Application**: Port definitions
//!   - `ports`: transport and channel catalog interfaces
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bitstamp`: frame codec, connection session and stream coordinator
//!   - `memory`: in-process transport for replay and tests
//!   - `config`: environment configuration
//!   - `metrics`, `telemetry`: Prometheus metrics and tracing
//!
//! # Data Flow
//!
//! ```text
//!                  ┌───────────┐   ┌────────────┐   ┌─────────────┐
//! Bitstamp WS ────►│  Session  │──►│ FrameCodec │──►│ mpsc buffer │──► Consumer
//!                  └───────────┘   └────────────┘   └─────────────┘
//!                        ▲
//!  subscribe / unsubscribe (serialized writes)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::channel::{Channel, ChannelFamily, Pair, QuoteCurrency, UnknownChannel};
pub use domain::streaming::{Envelope, EnvelopeError, Payload};
pub use domain::subscription::SubscriptionRegistry;

// Ports
pub use application::ports::{ChannelCatalog, Transport, TransportError};

// Client
pub use infrastructure::bitstamp::{
    EnvelopeStream, StaticCatalog, StreamConfig, StreamCoordinator, StreamError, StreamState,
    WebSocketTransport,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, StreamSettings};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
