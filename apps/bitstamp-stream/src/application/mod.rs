//! Application Layer - Port definitions.
//!
//! This layer defines how the stream client talks to the transport and the
//! channel catalog.

/// Port interfaces for external systems (transport, catalog).
pub mod ports;
