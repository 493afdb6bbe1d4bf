//! Frame Codec
//!
//! Parses inbound Bitstamp frames into [`Envelope`]s and builds outbound
//! control frames.
//!
//! Decoding happens in three steps:
//!
//! 1. [`FrameCodec::decode`] parses the outer `{event, channel, data}` object.
//! 2. [`FrameCodec::classify`] resolves the channel name against the catalog.
//! 3. [`FrameCodec::decode_payload`] decodes `data` by channel family.
//!
//! [`FrameCodec::envelope`] runs all three and never fails: every frame turns
//! into exactly one envelope, with any error attached to it next to the raw
//! text.

use std::sync::Arc;

use serde::Deserialize;

use crate::application::ports::ChannelCatalog;
use crate::domain::channel::{Channel, ChannelFamily};
use crate::domain::streaming::{Envelope, EnvelopeError, OrderEvent, Payload};
use crate::infrastructure::bitstamp::messages::{
    ControlFrame, DATA_EVENT, ERROR_EVENT, InboundFrame, RECONNECT_EVENT, ServerError,
    TRADE_EVENT,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Text is not a frame envelope.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// `data` does not match the family's payload shape.
    #[error("failed to decode {family:?} payload: {source}")]
    PayloadDecode {
        /// Family the payload was decoded as.
        family: ChannelFamily,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Control frame serialization failed.
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<CodecError> for EnvelopeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MalformedFrame(source) => Self::MalformedFrame(source.to_string()),
            CodecError::PayloadDecode { family, source } => Self::PayloadDecode {
                family,
                message: source.to_string(),
            },
            CodecError::Encode(source) => Self::MalformedFrame(source.to_string()),
        }
    }
}

/// Parsed outer envelope of an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Event name.
    pub event: String,
    /// Channel wire name, empty when absent.
    pub channel: String,
    /// Undecoded payload.
    pub data: serde_json::Value,
}

impl Frame {
    /// Check if this is the server's reconnect request.
    #[must_use]
    pub fn is_maintenance(&self) -> bool {
        self.event == RECONNECT_EVENT
    }
}

/// JSON codec for the Bitstamp v2 stream.
#[derive(Clone)]
pub struct FrameCodec {
    catalog: Arc<dyn ChannelCatalog>,
}

impl std::fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec").finish_non_exhaustive()
    }
}

impl FrameCodec {
    /// Create a codec that resolves channels through `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn ChannelCatalog>) -> Self {
        Self { catalog }
    }

    /// Parse the outer envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedFrame`] if the text is not a JSON object
    /// with a string `event`.
    pub fn decode(&self, raw: &str) -> Result<Frame, CodecError> {
        let inbound: InboundFrame =
            serde_json::from_str(raw).map_err(CodecError::MalformedFrame)?;

        Ok(Frame {
            event: inbound.event,
            channel: inbound.channel.unwrap_or_default(),
            data: inbound.data,
        })
    }

    /// Resolve a wire channel name. Unknown names are not an error.
    #[must_use]
    pub fn classify(&self, wire_name: &str) -> Option<Channel> {
        if wire_name.is_empty() {
            return None;
        }
        self.catalog.resolve(wire_name)
    }

    /// Decode `data` according to the channel family.
    ///
    /// Only the family's data events decode into a typed payload; other
    /// events on the same channel (acknowledgements, errors) come back as
    /// [`Payload::Event`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadDecode`] if a data event's payload does not
    /// match the family's shape.
    pub fn decode_payload(
        family: ChannelFamily,
        event: &str,
        data: serde_json::Value,
    ) -> Result<Payload, CodecError> {
        let typed = |source| CodecError::PayloadDecode { family, source };

        let payload = match (family, event) {
            (ChannelFamily::LiveTrades, TRADE_EVENT) => {
                Payload::Ticker(serde_json::from_value(data).map_err(typed)?)
            }
            (ChannelFamily::LiveOrders, _) => match OrderEvent::from_event(event) {
                Some(order_event) => Payload::Order {
                    event: order_event,
                    order: serde_json::from_value(data).map_err(typed)?,
                },
                None => Payload::Event(data),
            },
            (ChannelFamily::OrderBook, DATA_EVENT) => {
                Payload::OrderBookSnapshot(serde_json::from_value(data).map_err(typed)?)
            }
            (ChannelFamily::DiffOrderBook, DATA_EVENT) => {
                Payload::OrderBookDiff(serde_json::from_value(data).map_err(typed)?)
            }
            (ChannelFamily::DetailOrderBook, DATA_EVENT) => {
                Payload::FullOrderBook(serde_json::from_value(data).map_err(typed)?)
            }
            _ => Payload::Event(data),
        };

        Ok(payload)
    }

    /// Reason the server gave in a `bts:error` envelope.
    ///
    /// `None` for any other event, or when `data` has no usable shape.
    #[must_use]
    pub fn server_error(envelope: &Envelope) -> Option<ServerError> {
        if envelope.event != ERROR_EVENT {
            return None;
        }
        match &envelope.payload {
            Some(Payload::Event(data)) => ServerError::deserialize(data).ok(),
            _ => None,
        }
    }

    /// Build a subscribe control frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_subscribe(&self, channel: Channel) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&ControlFrame::subscribe(
            channel.wire_name(),
        ))?)
    }

    /// Build an unsubscribe control frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_unsubscribe(&self, channel: Channel) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&ControlFrame::unsubscribe(
            channel.wire_name(),
        ))?)
    }

    /// Turn one inbound frame into exactly one envelope.
    #[must_use]
    pub fn envelope(&self, raw: String) -> Envelope {
        let frame = match self.decode(&raw) {
            Ok(frame) => frame,
            Err(err) => {
                return Envelope {
                    channel: None,
                    channel_name: String::new(),
                    event: String::new(),
                    raw,
                    payload: None,
                    error: Some(err.into()),
                };
            }
        };

        let channel = self.classify(&frame.channel);

        let (payload, error) = if frame.is_maintenance() {
            (None, Some(EnvelopeError::Maintenance))
        } else {
            let decoded = match channel {
                Some(channel) => Self::decode_payload(channel.family(), &frame.event, frame.data),
                None => Ok(Payload::Event(frame.data)),
            };
            match decoded {
                Ok(payload) => (Some(payload), None),
                Err(err) => (None, Some(err.into())),
            }
        };

        Envelope {
            channel,
            channel_name: frame.channel,
            event: frame.event,
            raw,
            payload,
            error,
        }
    }
}
