//! Subscription Registry
//!
//! Tracks the set of channels the client believes it is subscribed to on the
//! current connection.
//!
//! # Design
//!
//! The registry is keyed by wire name and only ever updated after the
//! matching control frame has been written to the socket, so its contents
//! mirror the last intent the server was actually sent. It is created per
//! session and never carried over to a new one.
//!
//! A single lock guards every operation and is never held across I/O.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::domain::channel::Channel;

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe set of subscribed channels.
///
/// # Example
///
/// ```rust
/// use bitstamp_stream::domain::channel::{Channel, Pair};
/// use bitstamp_stream::domain::subscription::SubscriptionRegistry;
///
/// let registry = SubscriptionRegistry::new();
/// let btc = Channel::live_trades(Pair::BTC_EUR);
///
/// assert!(registry.add(btc));
/// assert!(!registry.add(btc)); // already present
/// assert_eq!(registry.snapshot(), vec![btc]);
///
/// assert!(registry.remove(btc));
/// assert!(!registry.remove(btc)); // no-op
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    channels: Mutex<BTreeMap<String, Channel>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel. Returns `true` if it was not already present.
    pub fn add(&self, channel: Channel) -> bool {
        self.channels
            .lock()
            .insert(channel.wire_name(), channel)
            .is_none()
    }

    /// Remove a channel. Returns `true` if it was present.
    pub fn remove(&self, channel: Channel) -> bool {
        self.channels.lock().remove(&channel.wire_name()).is_some()
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.lock().contains_key(&channel.wire_name())
    }

    /// Current members ordered by wire name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels.lock().values().copied().collect()
    }

    /// Number of subscribed channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// Check if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Drop every member.
    pub fn clear(&self) {
        self.channels.lock().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
