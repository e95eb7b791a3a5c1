pub mod feed;
pub mod price_book;
pub mod simulator;

use std::collections::HashMap;

pub use feed::MarketFeed;
pub use price_book::PriceBook;
pub use simulator::SimulatedSource;

/// Read-only view of current prices and bounded price histories.
///
/// The trading core only ever reads through this trait; the feed owns all
/// writes.
pub trait PriceFeed: Send + Sync {
    /// Latest known price per symbol.  Symbols never priced are absent.
    fn current_prices(&self) -> HashMap<String, f64>;

    /// Oldest-first price history per symbol; the last sample is the
    /// current price.
    fn history(&self) -> HashMap<String, Vec<f64>>;
}

/// Errors at the price-feed boundary.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("price source failed: {0:#}")]
    Source(#[from] anyhow::Error),
}
