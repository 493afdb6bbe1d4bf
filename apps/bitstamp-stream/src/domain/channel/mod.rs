//! Channel Catalog Types
//!
//! Static catalog of Bitstamp trading pairs and the channel families that
//! can be streamed for each of them.
//!
//! # Design
//!
//! A [`Channel`] is a `Copy` value made of a [`ChannelFamily`] and a [`Pair`].
//! Pairs only exist as associated constants drawn from one immutable table,
//! so every `Channel` in the program names a topic the feed actually serves.
//!
//! The wire name of a channel is `<family prefix><pair url symbol>`, for
//! example `live_trades_btceur` or `diff_order_book_ethusd`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// =============================================================================
// Pair
// =============================================================================

/// A trading pair listed on the feed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    url_symbol: &'static str,
    base: &'static str,
    quote: &'static str,
}

macro_rules! pairs {
    ($($name:ident => ($base:literal, $quote:literal)),+ $(,)?) => {
        impl Pair {
            $(
                #[doc = concat!("`", $base, "/", $quote, "`")]
                pub const $name: Self = Self {
                    url_symbol: concat!($base, $quote),
                    base: $base,
                    quote: $quote,
                };
            )+
        }

        const PAIRS: &[Pair] = &[$(Pair::$name),+];
    };
}

pairs! {
    AAVE_BTC => ("aave", "btc"),
    AAVE_EUR => ("aave", "eur"),
    AAVE_USD => ("aave", "usd"),
    BAT_BTC => ("bat", "btc"),
    BAT_EUR => ("bat", "eur"),
    BAT_USD => ("bat", "usd"),
    BCH_BTC => ("bch", "btc"),
    BCH_EUR => ("bch", "eur"),
    BCH_GBP => ("bch", "gbp"),
    BCH_USD => ("bch", "usd"),
    BTC_EUR => ("btc", "eur"),
    BTC_GBP => ("btc", "gbp"),
    BTC_USD => ("btc", "usd"),
    BTC_USDC => ("btc", "usdc"),
    BTC_USDT => ("btc", "usdt"),
    ETH_BTC => ("eth", "btc"),
    ETH_EUR => ("eth", "eur"),
    ETH_GBP => ("eth", "gbp"),
    ETH_USD => ("eth", "usd"),
    ETH_USDT => ("eth", "usdt"),
    EUR_USD => ("eur", "usd"),
    GBP_EUR => ("gbp", "eur"),
    GBP_USD => ("gbp", "usd"),
    LINK_BTC => ("link", "btc"),
    LINK_ETH => ("link", "eth"),
    LINK_EUR => ("link", "eur"),
    LINK_GBP => ("link", "gbp"),
    LINK_USD => ("link", "usd"),
    LTC_BTC => ("ltc", "btc"),
    LTC_EUR => ("ltc", "eur"),
    LTC_GBP => ("ltc", "gbp"),
    LTC_USD => ("ltc", "usd"),
    UNI_BTC => ("uni", "btc"),
    UNI_EUR => ("uni", "eur"),
    UNI_USD => ("uni", "usd"),
    USDC_EUR => ("usdc", "eur"),
    USDC_USD => ("usdc", "usd"),
    USDT_EUR => ("usdt", "eur"),
    USDT_USD => ("usdt", "usd"),
    XLM_BTC => ("xlm", "btc"),
    XLM_EUR => ("xlm", "eur"),
    XLM_GBP => ("xlm", "gbp"),
    XLM_USD => ("xlm", "usd"),
    XRP_BTC => ("xrp", "btc"),
    XRP_EUR => ("xrp", "eur"),
    XRP_GBP => ("xrp", "gbp"),
    XRP_USD => ("xrp", "usd"),
    ZRX_BTC => ("zrx", "btc"),
    ZRX_EUR => ("zrx", "eur"),
    ZRX_USD => ("zrx", "usd"),
}

static PAIRS_BY_SYMBOL: LazyLock<HashMap<&'static str, Pair>> =
    LazyLock::new(|| PAIRS.iter().map(|pair| (pair.url_symbol, *pair)).collect());

impl Pair {
    /// Every pair in the catalog, sorted by url symbol.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        PAIRS
    }

    /// Look up a pair by its url symbol (`btceur`).
    #[must_use]
    pub fn from_url_symbol(symbol: &str) -> Option<Self> {
        PAIRS_BY_SYMBOL.get(symbol).copied()
    }

    /// Lowercase concatenated symbol used in channel names and URLs.
    #[must_use]
    pub const fn url_symbol(&self) -> &'static str {
        self.url_symbol
    }

    /// Base asset (`btc` in `btceur`).
    #[must_use]
    pub const fn base(&self) -> &'static str {
        self.base
    }

    /// Quote asset (`eur` in `btceur`).
    #[must_use]
    pub const fn quote(&self) -> &'static str {
        self.quote
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.base.to_uppercase(),
            self.quote.to_uppercase()
        )
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pair({})", self.url_symbol)
    }
}

// =============================================================================
// Quote Currency
// =============================================================================

/// Quote currencies the catalog can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteCurrency {
    /// Euro.
    Eur,
    /// US dollar.
    Usd,
    /// Bitcoin.
    Btc,
    /// Pound sterling.
    Gbp,
}

impl QuoteCurrency {
    /// Lowercase asset code as it appears in url symbols.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eur => "eur",
            Self::Usd => "usd",
            Self::Btc => "btc",
            Self::Gbp => "gbp",
        }
    }
}

// =============================================================================
// Channel Family
// =============================================================================

/// Payload family of a channel. Determines how its data frames decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelFamily {
    /// Executed trades (`live_trades_*`).
    LiveTrades,
    /// Order created/changed/deleted events (`live_orders_*`).
    LiveOrders,
    /// Top 100 aggregated bids and asks (`order_book_*`).
    OrderBook,
    /// Every order on the book with its id (`detail_order_book_*`).
    DetailOrderBook,
    /// Changes to the full book since the last message (`diff_order_book_*`).
    DiffOrderBook,
}

impl ChannelFamily {
    /// All families, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::LiveTrades,
        Self::LiveOrders,
        Self::OrderBook,
        Self::DetailOrderBook,
        Self::DiffOrderBook,
    ];

    /// Wire name prefix, including the trailing underscore.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::LiveTrades => "live_trades_",
            Self::LiveOrders => "live_orders_",
            Self::OrderBook => "order_book_",
            Self::DetailOrderBook => "detail_order_book_",
            Self::DiffOrderBook => "diff_order_book_",
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LiveTrades => "live_trades",
            Self::LiveOrders => "live_orders",
            Self::OrderBook => "order_book",
            Self::DetailOrderBook => "detail_order_book",
            Self::DiffOrderBook => "diff_order_book",
        }
    }

    /// Split a wire name into its family and the remaining pair symbol.
    ///
    /// `order_book_` is a suffix of the detail and diff prefixes, so those are
    /// tried before it.
    fn split_wire_name(name: &str) -> Option<(Self, &str)> {
        const MATCH_ORDER: [ChannelFamily; 5] = [
            ChannelFamily::DetailOrderBook,
            ChannelFamily::DiffOrderBook,
            ChannelFamily::LiveTrades,
            ChannelFamily::LiveOrders,
            ChannelFamily::OrderBook,
        ];

        MATCH_ORDER
            .into_iter()
            .find_map(|family| name.strip_prefix(family.prefix()).map(|rest| (family, rest)))
    }
}

// =============================================================================
// Channel
// =============================================================================

/// One logical topic multiplexed over the feed connection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel {
    family: ChannelFamily,
    pair: Pair,
}

impl Channel {
    /// Create a channel from its family and pair.
    #[must_use]
    pub const fn new(family: ChannelFamily, pair: Pair) -> Self {
        Self { family, pair }
    }

    /// Trade feed for a pair.
    #[must_use]
    pub const fn live_trades(pair: Pair) -> Self {
        Self::new(ChannelFamily::LiveTrades, pair)
    }

    /// Order event feed for a pair.
    #[must_use]
    pub const fn live_orders(pair: Pair) -> Self {
        Self::new(ChannelFamily::LiveOrders, pair)
    }

    /// Aggregated order book snapshots for a pair.
    #[must_use]
    pub const fn order_book(pair: Pair) -> Self {
        Self::new(ChannelFamily::OrderBook, pair)
    }

    /// Detailed (per-order) book for a pair.
    #[must_use]
    pub const fn detail_order_book(pair: Pair) -> Self {
        Self::new(ChannelFamily::DetailOrderBook, pair)
    }

    /// Incremental book changes for a pair.
    #[must_use]
    pub const fn diff_order_book(pair: Pair) -> Self {
        Self::new(ChannelFamily::DiffOrderBook, pair)
    }

    /// Payload family.
    #[must_use]
    pub const fn family(&self) -> ChannelFamily {
        self.family
    }

    /// Trading pair.
    #[must_use]
    pub const fn pair(&self) -> Pair {
        self.pair
    }

    /// Name sent and received on the wire.
    #[must_use]
    pub fn wire_name(&self) -> String {
        format!("{}{}", self.family.prefix(), self.pair.url_symbol())
    }

    /// Resolve a wire name against the catalog.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        let (family, symbol) = ChannelFamily::split_wire_name(name)?;
        Pair::from_url_symbol(symbol).map(|pair| Self::new(family, pair))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.family.prefix(), self.pair.url_symbol())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({self})")
    }
}

/// Error returned when a wire name is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_name(s.trim()).ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

// =============================================================================
// Group Helpers
// =============================================================================

static CHANNELS: LazyLock<Vec<Channel>> = LazyLock::new(|| {
    PAIRS
        .iter()
        .flat_map(|pair| {
            ChannelFamily::ALL
                .into_iter()
                .map(|family| Channel::new(family, *pair))
        })
        .collect()
});

/// Every channel of every pair in the catalog.
#[must_use]
pub fn all_channels() -> &'static [Channel] {
    &CHANNELS
}

/// Pairs quoted in the given currency.
#[must_use]
pub fn pairs_quoted_in(currency: QuoteCurrency) -> Vec<Pair> {
    PAIRS
        .iter()
        .filter(|pair| pair.quote == currency.as_str())
        .copied()
        .collect()
}

/// Channels whose pair is quoted in the given currency.
#[must_use]
pub fn channels_quoted_in(currency: QuoteCurrency) -> Vec<Channel> {
    CHANNELS
        .iter()
        .filter(|channel| channel.pair.quote == currency.as_str())
        .copied()
        .collect()
}

/// Channels of one family, one per pair.
#[must_use]
pub fn channels_of(family: ChannelFamily) -> Vec<Channel> {
    PAIRS.iter().map(|pair| Channel::new(family, *pair)).collect()
}

// =============================================================================
// Tests
// =============================================================================
