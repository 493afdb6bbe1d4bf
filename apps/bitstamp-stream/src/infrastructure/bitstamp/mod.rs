//! Bitstamp WebSocket Client
//!
//! Streams market data from the Bitstamp v2 WebSocket API.
//!
//! # Stream URL
//!
//! - Production: `wss://ws.bitstamp.net`
//!
//! # Protocol
//!
//! Every frame is a JSON object `{event, channel, data}`. Clients subscribe
//! per channel; the server acknowledges each request and pushes data events
//! on the channel until unsubscribed. A `bts:request_reconnect` event asks
//! clients to move to a new connection ahead of maintenance.
//!
//! # Components
//!
//! - [`StreamCoordinator`]: lifecycle, subscriptions and the envelope stream
//! - [`ConnectionSession`]: one live connection with serialized writes
//! - [`FrameCodec`]: frame parsing and control frame encoding
//! - [`WebSocketTransport`]: tokio-tungstenite transport
//! - [`StaticCatalog`]: built-in channel catalog

pub mod catalog;
pub mod codec;
pub mod coordinator;
pub mod messages;
pub mod session;
pub mod websocket;

pub use catalog::StaticCatalog;
pub use codec::{CodecError, Frame, FrameCodec};
pub use coordinator::{
    ControlAction, EnvelopeStream, StreamConfig, StreamCoordinator, StreamError, StreamState,
};
pub use session::{ConnectionSession, SessionConfig, SessionError};
pub use websocket::WebSocketTransport;
