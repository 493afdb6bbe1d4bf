//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Bitstamp WebSocket client: codec, session and coordinator.
pub mod bitstamp;

/// Environment configuration.
pub mod config;

/// In-memory transport for replay and tests.
pub mod memory;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;
