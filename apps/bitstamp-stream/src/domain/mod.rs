//! Domain Layer - Core streaming types.
//!
//! This layer contains the channel catalog, payload types and subscription
//! registry. Nothing here performs I/O.

/// Trading pairs, channel families and channel identifiers.
pub mod channel;

/// Typed payloads and the envelope delivered to consumers.
pub mod streaming;

/// Subscription registry.
pub mod subscription;
