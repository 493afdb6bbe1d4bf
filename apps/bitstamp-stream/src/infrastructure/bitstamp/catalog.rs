//! Static channel catalog backed by the built-in pair table.

use crate::application::ports::ChannelCatalog;
use crate::domain::channel::Channel;

/// Catalog of every channel of every listed pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticCatalog;

impl StaticCatalog {
    /// Create the catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ChannelCatalog for StaticCatalog {
    fn resolve(&self, wire_name: &str) -> Option<Channel> {
        Channel::from_wire_name(wire_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::Pair;

    #[test]
    fn resolves_catalog_names_only() {
        let catalog = StaticCatalog::new();
        assert_eq!(
            catalog.resolve("order_book_ethbtc"),
            Some(Channel::order_book(Pair::ETH_BTC))
        );
        assert_eq!(catalog.resolve("order_book_ethxyz"), None);
    }
}
