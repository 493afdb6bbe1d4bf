//! Port Interfaces
//!
//! Defines the interfaces (ports) the stream client depends on. These are the
//! contracts that infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Transport`]: opens a duplex text-frame connection, split into a
//!   [`FrameSink`] (write half) and a [`FrameSource`] (read half)
//! - [`ChannelCatalog`]: resolves wire channel names to catalog channels

use async_trait::async_trait;

use crate::domain::channel::Channel;

// =============================================================================
// Transport
// =============================================================================

/// Errors reported by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Write half is closed.
    #[error("connection closed")]
    Closed,

    /// Any other I/O or protocol failure.
    #[error("{0}")]
    Io(String),
}

/// Write half of an open connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Must be safe to call more than once.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an open connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next text frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn receive_text(&mut self) -> Result<Option<String>, TransportError>;
}

/// Both halves of an open connection.
pub struct Connection {
    /// Write half.
    pub sink: Box<dyn FrameSink>,
    /// Read half.
    pub source: Box<dyn FrameSource>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Factory for duplex connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

// =============================================================================
// Channel Catalog
// =============================================================================

/// Maps wire names to channels.
pub trait ChannelCatalog: Send + Sync {
    /// Resolve a wire name. `None` for names outside the catalog.
    fn resolve(&self, wire_name: &str) -> Option<Channel>;
}
