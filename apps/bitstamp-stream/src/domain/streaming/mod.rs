//! Market Data Streaming Types
//!
//! Typed payloads carried by the feed and the [`Envelope`] that wraps every
//! inbound frame before it reaches the consumer.
//!
//! # Payload Families
//!
//! | Family              | Payload variant              |
//! |---------------------|------------------------------|
//! | `live_trades`       | [`Payload::Ticker`]          |
//! | `live_orders`       | [`Payload::Order`]           |
//! | `order_book`        | [`Payload::OrderBookSnapshot`] |
//! | `diff_order_book`   | [`Payload::OrderBookDiff`]   |
//! | `detail_order_book` | [`Payload::FullOrderBook`]   |
//!
//! Anything else (subscription acknowledgements, server errors, frames for
//! channels outside the catalog) is delivered as [`Payload::Event`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::channel::{Channel, ChannelFamily};

// =============================================================================
// Trades
// =============================================================================

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TradeSide {
    /// Buy order took liquidity.
    Buy,
    /// Sell order took liquidity.
    Sell,
}

impl TryFrom<u8> for TradeSide {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Buy),
            1 => Ok(Self::Sell),
            other => Err(format!("invalid side: {other}")),
        }
    }
}

impl From<TradeSide> for u8 {
    fn from(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => 0,
            TradeSide::Sell => 1,
        }
    }
}

/// Executed trade from a `live_trades_*` channel.
///
/// # Wire Format (JSON)
/// ```json
/// {"id": 255555, "timestamp": "1700000000", "amount": 0.05, "amount_str": "0.05000000",
///  "price": 37000.5, "price_str": "37000.5", "type": 0,
///  "microtimestamp": "1700000000123456", "buy_order_id": 1, "sell_order_id": 2}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// Trade id.
    pub id: u64,

    /// Traded amount, parsed from the exact string form.
    #[serde(rename = "amount_str")]
    pub amount: Decimal,

    /// Trade price, parsed from the exact string form.
    #[serde(rename = "price_str")]
    pub price: Decimal,

    /// Aggressor side.
    #[serde(rename = "type")]
    pub side: TradeSide,

    /// Unix seconds.
    pub timestamp: String,

    /// Unix microseconds.
    pub microtimestamp: String,

    /// Buy order id.
    pub buy_order_id: u64,

    /// Sell order id.
    pub sell_order_id: u64,
}

impl Ticker {
    /// Trade time with microsecond precision.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        parse_micros(&self.microtimestamp)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// What happened to an order on a `live_orders_*` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    /// `order_created`
    Created,
    /// `order_changed`
    Changed,
    /// `order_deleted`
    Deleted,
}

impl OrderEvent {
    /// Parse the protocol event name.
    #[must_use]
    pub fn from_event(event: &str) -> Option<Self> {
        match event {
            "order_created" => Some(Self::Created),
            "order_changed" => Some(Self::Changed),
            "order_deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Protocol event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "order_created",
            Self::Changed => "order_changed",
            Self::Deleted => "order_deleted",
        }
    }
}

/// Order book side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OrderSide {
    /// Bid.
    Buy,
    /// Ask.
    Sell,
}

impl TryFrom<u8> for OrderSide {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Buy),
            1 => Ok(Self::Sell),
            other => Err(format!("invalid order type: {other}")),
        }
    }
}

impl From<OrderSide> for u8 {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => 0,
            OrderSide::Sell => 1,
        }
    }
}

/// Order from a `live_orders_*` channel.
///
/// # Wire Format (JSON)
/// ```json
/// {"id": 1658, "id_str": "1658", "order_type": 1, "datetime": "1700000000",
///  "microtimestamp": "1700000000123456", "amount": 0.5, "amount_str": "0.50000000",
///  "price": 37010, "price_str": "37010"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: u64,

    /// Buy or sell.
    #[serde(rename = "order_type")]
    pub side: OrderSide,

    /// Remaining amount.
    #[serde(rename = "amount_str")]
    pub amount: Decimal,

    /// Limit price.
    #[serde(rename = "price_str")]
    pub price: Decimal,

    /// Unix seconds.
    pub datetime: String,

    /// Unix microseconds.
    pub microtimestamp: String,
}

impl Order {
    /// Event time with microsecond precision.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        parse_micros(&self.microtimestamp)
    }
}

// =============================================================================
// Order Books
// =============================================================================

/// Aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Decimal, Decimal)", into = "(Decimal, Decimal)")]
pub struct PriceLevel {
    /// Level price.
    pub price: Decimal,
    /// Total amount at this price.
    pub amount: Decimal,
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, amount): (Decimal, Decimal)) -> Self {
        Self { price, amount }
    }
}

impl From<PriceLevel> for (Decimal, Decimal) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.amount)
    }
}

/// Book snapshot or diff from `order_book_*` / `diff_order_book_*`.
///
/// In a diff, a zero amount removes the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Unix seconds.
    pub timestamp: String,
    /// Unix microseconds.
    pub microtimestamp: String,
    /// Bids, best first.
    pub bids: Vec<PriceLevel>,
    /// Asks, best first.
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    /// Highest bid.
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    /// Lowest ask.
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    /// Book time with microsecond precision.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        parse_micros(&self.microtimestamp)
    }
}

/// One resting order in a detailed book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Decimal, Decimal, String)", into = "(Decimal, Decimal, String)")]
pub struct OrderLevel {
    /// Order price.
    pub price: Decimal,
    /// Order amount.
    pub amount: Decimal,
    /// Order id.
    pub order_id: String,
}

impl From<(Decimal, Decimal, String)> for OrderLevel {
    fn from((price, amount, order_id): (Decimal, Decimal, String)) -> Self {
        Self {
            price,
            amount,
            order_id,
        }
    }
}

impl From<OrderLevel> for (Decimal, Decimal, String) {
    fn from(level: OrderLevel) -> Self {
        (level.price, level.amount, level.order_id)
    }
}

/// Per-order book from `detail_order_book_*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailOrderBook {
    /// Unix seconds.
    pub timestamp: String,
    /// Unix microseconds.
    pub microtimestamp: String,
    /// Resting bids.
    pub bids: Vec<OrderLevel>,
    /// Resting asks.
    pub asks: Vec<OrderLevel>,
}

impl DetailOrderBook {
    /// Book time with microsecond precision.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        parse_micros(&self.microtimestamp)
    }
}

fn parse_micros(micros: &str) -> Option<DateTime<Utc>> {
    micros
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_micros)
}

// =============================================================================
// Payload
// =============================================================================

/// Decoded payload of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Trade from a live trades channel.
    Ticker(Ticker),
    /// Order event from a live orders channel.
    Order {
        /// Created, changed or deleted.
        event: OrderEvent,
        /// The order.
        order: Order,
    },
    /// Aggregated book from an order book channel.
    OrderBookSnapshot(OrderBook),
    /// Book changes from a diff order book channel.
    OrderBookDiff(OrderBook),
    /// Per-order book from a detail order book channel.
    FullOrderBook(DetailOrderBook),
    /// Any other event; `data` is kept as-is.
    Event(serde_json::Value),
}

impl Payload {
    /// Family whose typed payload this is, `None` for generic events.
    #[must_use]
    pub const fn family(&self) -> Option<ChannelFamily> {
        match self {
            Self::Ticker(_) => Some(ChannelFamily::LiveTrades),
            Self::Order { .. } => Some(ChannelFamily::LiveOrders),
            Self::OrderBookSnapshot(_) => Some(ChannelFamily::OrderBook),
            Self::OrderBookDiff(_) => Some(ChannelFamily::DiffOrderBook),
            Self::FullOrderBook(_) => Some(ChannelFamily::DetailOrderBook),
            Self::Event(_) => None,
        }
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// Error attached to an [`Envelope`].
///
/// Frame-level variants leave the stream running. Terminal variants are only
/// ever carried by the last envelope of a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Frame was not a well-formed `{event, channel, data}` object.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame envelope parsed but `data` did not match the family's shape.
    #[error("failed to decode {family:?} payload: {message}")]
    PayloadDecode {
        /// Expected payload family.
        family: ChannelFamily,
        /// Decoder message.
        message: String,
    },

    /// Server asked clients to reconnect ahead of maintenance.
    #[error("server requested reconnect for maintenance")]
    Maintenance,

    /// Transport closed the connection.
    #[error("transport closed")]
    TransportClosed,

    /// Transport failed while reading.
    #[error("transport error: {0}")]
    Transport(String),

    /// Governing context was cancelled.
    #[error("stream cancelled")]
    Cancelled,
}

impl EnvelopeError {
    /// Check if this error ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Maintenance | Self::TransportClosed | Self::Transport(_) | Self::Cancelled
        )
    }
}

/// One unit of inbound data delivered to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Originating channel, when the wire name is in the catalog.
    pub channel: Option<Channel>,
    /// Channel name exactly as received (empty if absent).
    pub channel_name: String,
    /// Protocol event name (empty if the frame could not be parsed).
    pub event: String,
    /// Frame text as received. Empty only for envelopes the client synthesizes.
    pub raw: String,
    /// Decoded payload.
    pub payload: Option<Payload>,
    /// Decode or terminal error.
    pub error: Option<EnvelopeError>,
}

impl Envelope {
    /// Envelope carrying only a terminal condition with no frame behind it.
    #[must_use]
    pub const fn terminal(error: EnvelopeError) -> Self {
        Self {
            channel: None,
            channel_name: String::new(),
            event: String::new(),
            raw: String::new(),
            payload: None,
            error: Some(error),
        }
    }

    /// Check if this envelope reports the maintenance signal.
    #[must_use]
    pub fn is_maintenance(&self) -> bool {
        matches!(self.error, Some(EnvelopeError::Maintenance))
    }

    /// Check if this envelope is the last one the stream will produce.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.error.as_ref().is_some_and(EnvelopeError::is_terminal)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_uses_exact_string_amounts() {
        let json = r#"{"id": 255555, "timestamp": "1700000000", "amount": 0.05,
            "amount_str": "0.05000000", "price": 37000.5, "price_str": "37000.5",
            "type": 1, "microtimestamp": "1700000000123456",
            "buy_order_id": 11, "sell_order_id": 12}"#;

        let ticker: Ticker = serde_json::from_str(json).unwrap();
        assert_eq!(ticker.amount, Decimal::new(5_000_000, 8));
        assert_eq!(ticker.price, Decimal::new(370_005, 1));
        assert_eq!(ticker.side, TradeSide::Sell);
        assert_eq!(
            ticker.time().unwrap().timestamp_micros(),
            1_700_000_000_123_456
        );
    }

    #[test]
    fn trade_side_rejects_unknown_values() {
        assert!(TradeSide::try_from(2).is_err());
        assert_eq!(u8::from(TradeSide::Buy), 0);
    }

    #[test]
    fn order_book_levels_decode_from_string_pairs() {
        let json = r#"{"timestamp": "1700000000", "microtimestamp": "1700000000000001",
            "bids": [["37000.10", "0.5"], ["36999", "1.25"]],
            "asks": [["37001", "0.1"]]}"#;

        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(
            book.best_bid(),
            Some(PriceLevel {
                price: Decimal::new(3_700_010, 2),
                amount: Decimal::new(5, 1),
            })
        );
        assert_eq!(book.best_ask().unwrap().price, Decimal::from(37_001));
    }

    #[test]
    fn detail_book_keeps_order_ids() {
        let json = r#"{"timestamp": "1", "microtimestamp": "1000000",
            "bids": [["100", "2", "1513412341231"]], "asks": []}"#;

        let book: DetailOrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids[0].order_id, "1513412341231");
        assert!(book.asks.is_empty());
    }

    #[test]
    fn order_event_names() {
        for event in [OrderEvent::Created, OrderEvent::Changed, OrderEvent::Deleted] {
            assert_eq!(OrderEvent::from_event(event.as_str()), Some(event));
        }
        assert_eq!(OrderEvent::from_event("trade"), None);
    }

    #[test]
    fn terminal_classification() {
        assert!(EnvelopeError::Maintenance.is_terminal());
        assert!(EnvelopeError::Cancelled.is_terminal());
        assert!(EnvelopeError::TransportClosed.is_terminal());
        assert!(EnvelopeError::Transport("reset".into()).is_terminal());
        assert!(!EnvelopeError::MalformedFrame("x".into()).is_terminal());

        let envelope = Envelope::terminal(EnvelopeError::Maintenance);
        assert!(envelope.is_maintenance());
        assert!(envelope.is_terminal());
    }

    #[test]
    fn payload_family_mapping() {
        assert_eq!(Payload::Event(serde_json::Value::Null).family(), None);
        let book = OrderBook {
            timestamp: String::new(),
            microtimestamp: String::new(),
            bids: vec![],
            asks: vec![],
        };
        assert_eq!(
            Payload::OrderBookDiff(book).family(),
            Some(ChannelFamily::DiffOrderBook)
        );
    }
}
