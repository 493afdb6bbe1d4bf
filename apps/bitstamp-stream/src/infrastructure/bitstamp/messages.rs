//! Bitstamp WebSocket Message Types
//!
//! Wire format types for the Bitstamp v2 WebSocket API. Every frame in both
//! directions is a JSON object of the form:
//!
//! ```json
//! {"event": "trade", "channel": "live_trades_btceur", "data": {...}}
//! ```
//!
//! # References
//!
//! - [WebSocket API v2](https://www.bitstamp.net/websocket/v2/)

use serde::{Deserialize, Serialize};

// =============================================================================
// Event Names
// =============================================================================

/// Client request to start a channel.
pub const SUBSCRIBE_EVENT: &str = "bts:subscribe";

/// Client request to stop a channel.
pub const UNSUBSCRIBE_EVENT: &str = "bts:unsubscribe";

/// Server acknowledgement of a subscribe request.
pub const SUBSCRIPTION_SUCCEEDED_EVENT: &str = "bts:subscription_succeeded";

/// Server acknowledgement of an unsubscribe request.
pub const UNSUBSCRIPTION_SUCCEEDED_EVENT: &str = "bts:unsubscription_succeeded";

/// Server asks clients to reconnect ahead of maintenance.
pub const RECONNECT_EVENT: &str = "bts:request_reconnect";

/// Server rejected a request.
pub const ERROR_EVENT: &str = "bts:error";

/// Data event of the trade channels.
pub const TRADE_EVENT: &str = "trade";

/// Data event of the order book channels.
pub const DATA_EVENT: &str = "data";

// =============================================================================
// Inbound
// =============================================================================

/// Outer envelope of an inbound frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    /// Event name.
    pub event: String,

    /// Channel wire name. Absent or null on some server events.
    #[serde(default)]
    pub channel: Option<String>,

    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `data` of a `bts:error` event.
///
/// # Wire Format (JSON)
/// ```json
/// {"event": "bts:error", "channel": "", "data": {"code": null, "message": "Bad subscription string."}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    /// Error code, often null.
    #[serde(default)]
    pub code: Option<i64>,

    /// Human readable reason.
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Outbound
// =============================================================================

/// Subscribe/unsubscribe control frame.
///
/// # Wire Format (JSON)
/// ```json
/// {"event": "bts:subscribe", "data": {"channel": "live_trades_btceur"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlFrame {
    /// `bts:subscribe` or `bts:unsubscribe`.
    pub event: &'static str,
    /// Target channel.
    pub data: ControlData,
}

/// Body of a control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlData {
    /// Channel wire name.
    pub channel: String,
}

impl ControlFrame {
    /// Subscribe request.
    #[must_use]
    pub fn subscribe(channel: String) -> Self {
        Self {
            event: SUBSCRIBE_EVENT,
            data: ControlData { channel },
        }
    }

    /// Unsubscribe request.
    #[must_use]
    pub fn unsubscribe(channel: String) -> Self {
        Self {
            event: UNSUBSCRIBE_EVENT,
            data: ControlData { channel },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frame_shape() {
        let json = serde_json::to_string(&ControlFrame::subscribe("live_trades_btceur".into()))
            .unwrap();
        assert_eq!(
            json,
            r#"{"event":"bts:subscribe","data":{"channel":"live_trades_btceur"}}"#
        );
    }

    #[test]
    fn inbound_frame_tolerates_missing_fields() {
        let frame: InboundFrame = serde_json::from_str(r#"{"event":"bts:request_reconnect"}"#)
            .unwrap();
        assert_eq!(frame.event, RECONNECT_EVENT);
        assert_eq!(frame.channel, None);
        assert!(frame.data.is_null());
    }

    #[test]
    fn server_error_with_null_code() {
        let err: ServerError =
            serde_json::from_str(r#"{"code": null, "message": "Bad subscription string."}"#)
                .unwrap();
        assert_eq!(err.code, None);
        assert_eq!(err.message, "Bad subscription string.");
    }
}
