// =============================================================================
// Market Feed — pulls prices from the configured source into the PriceBook
// =============================================================================
//
// `refresh()` runs once per tick before the decision phase.  Failures are
// isolated per symbol: a symbol whose fetch fails or returns an invalid price
// keeps its last known price and history, and is listed in the report.
// =============================================================================

use std::collections::HashMap;

use anyhow::Result;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{FeedError, PriceBook, PriceFeed, SimulatedSource};
use crate::binance::BinanceClient;
use crate::runtime_config::{FeedSource, RuntimeConfig};

pub enum PriceSource {
    Simulated(SimulatedSource),
    Binance {
        client: BinanceClient,
        quote_asset: String,
        kline_interval: String,
    },
}

impl PriceSource {
    pub fn kind(&self) -> FeedSource {
        match self {
            Self::Simulated(_) => FeedSource::Simulated,
            Self::Binance { .. } => FeedSource::Binance,
        }
    }
}

/// A symbol that could not be updated on this refresh.
#[derive(Debug, Clone, Serialize)]
pub struct FeedFailure {
    pub symbol: String,
    pub error: String,
}

/// Outcome of one refresh or warm-up.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub updated: Vec<String>,
    pub failed: Vec<FeedFailure>,
}

impl RefreshReport {
    fn record(&mut self, symbol: &str, outcome: Result<(), FeedError>) {
        match outcome {
            Ok(()) => self.updated.push(symbol.to_string()),
            Err(e) => {
                warn!(symbol, error = %e, "price update failed; keeping last known price");
                self.failed.push(FeedFailure {
                    symbol: symbol.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

pub struct MarketFeed {
    symbols: Vec<String>,
    book: PriceBook,
    source: PriceSource,
}

impl MarketFeed {
    pub fn new(symbols: Vec<String>, book: PriceBook, source: PriceSource) -> Self {
        Self {
            symbols,
            book,
            source,
        }
    }

    /// Build the feed described by `config`.  A simulated feed starts with
    /// one sample per symbol at the asset's starting price.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let book = PriceBook::new(config.symbols.iter().cloned(), config.price_history_len);
        let feed = &config.feed;

        let source = match feed.source {
            FeedSource::Simulated => {
                let assets: Vec<_> = feed
                    .simulated_assets
                    .iter()
                    .filter(|a| config.symbols.contains(&a.symbol))
                    .cloned()
                    .collect();
                let sim = SimulatedSource::new(&assets)?;
                for symbol in &config.symbols {
                    if let Some(price) = sim.price(symbol) {
                        book.record(symbol, price)?;
                    }
                }
                PriceSource::Simulated(sim)
            }
            FeedSource::Binance => PriceSource::Binance {
                client: BinanceClient::new(feed.binance_base_url.clone())?,
                quote_asset: feed.binance_quote_asset.clone(),
                kline_interval: feed.kline_interval.clone(),
            },
        };

        info!(
            source = %source.kind(),
            symbols = ?config.symbols,
            history_len = config.price_history_len,
            "market feed initialised"
        );

        Ok(Self::new(config.symbols.clone(), book, source))
    }

    #[cfg(test)]
    pub fn book(&self) -> &PriceBook {
        &self.book
    }

    pub fn source(&self) -> FeedSource {
        self.source.kind()
    }

    /// Pull one new price per symbol into the book.
    pub async fn refresh(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        match &self.source {
            PriceSource::Simulated(sim) => {
                let prices = sim.step();
                for symbol in &self.symbols {
                    let outcome = match prices.get(symbol) {
                        Some(&price) => self.book.record(symbol, price),
                        None => Err(FeedError::UnknownSymbol(symbol.clone())),
                    };
                    report.record(symbol, outcome);
                }
            }
            PriceSource::Binance {
                client,
                quote_asset,
                ..
            } => {
                let fetches = self.symbols.iter().map(|symbol| {
                    let pair = trading_pair(symbol, quote_asset);
                    async move { (symbol, client.get_ticker_price(&pair).await) }
                });

                for (symbol, fetched) in join_all(fetches).await {
                    let outcome = fetched
                        .map_err(FeedError::from)
                        .and_then(|price| self.book.record(symbol, price));
                    report.record(symbol, outcome);
                }
            }
        }

        debug!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "market feed refreshed"
        );
        report
    }

    /// Seed every symbol's history from recent klines so strategies can run
    /// from the first tick.  The simulated source has nothing to warm up.
    pub async fn warm_up(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        let PriceSource::Binance {
            client,
            quote_asset,
            kline_interval,
        } = &self.source
        else {
            return report;
        };

        let limit = u32::try_from(self.book.max_len()).unwrap_or(u32::MAX);
        let fetches = self.symbols.iter().map(|symbol| {
            let pair = trading_pair(symbol, quote_asset);
            async move {
                (
                    symbol,
                    client.get_kline_closes(&pair, kline_interval, limit).await,
                )
            }
        });

        for (symbol, fetched) in join_all(fetches).await {
            let outcome = fetched
                .map_err(FeedError::from)
                .and_then(|closes| self.book.seed(symbol, &closes))
                .map(|samples| debug!(symbol = %symbol, samples, "price history warmed up"));
            report.record(symbol, outcome);
        }

        info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "market feed warm-up complete"
        );
        report
    }
}

impl PriceFeed for MarketFeed {
    fn current_prices(&self) -> HashMap<String, f64> {
        self.book.current_prices()
    }

    fn history(&self) -> HashMap<String, Vec<f64>> {
        self.book.history()
    }
}

/// Binance pair for `symbol`: `BTC` + `USDT` -> `BTCUSDT`.  Symbols that
/// already end in the quote asset are passed through.
fn trading_pair(symbol: &str, quote_asset: &str) -> String {
    let symbol = symbol.to_uppercase();
    if quote_asset.is_empty() || symbol.ends_with(quote_asset) {
        symbol
    } else {
        format!("{symbol}{quote_asset}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::SimulatedAsset;

    fn simulated_feed(symbols: &[&str], history_len: usize) -> MarketFeed {
        let assets: Vec<_> = symbols
            .iter()
            .map(|s| SimulatedAsset::new(*s, 100.0, 0.01, 0.0))
            .collect();
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        let book = PriceBook::new(symbols.iter().cloned(), history_len);
        let sim = SimulatedSource::seeded(&assets, 3).unwrap();
        MarketFeed::new(symbols, book, PriceSource::Simulated(sim))
    }

    #[test]
    fn trading_pair_appends_quote_asset() {
        assert_eq!(trading_pair("btc", "USDT"), "BTCUSDT");
        assert_eq!(trading_pair("ETHUSDT", "USDT"), "ETHUSDT");
        assert_eq!(trading_pair("ETHBTC", ""), "ETHBTC");
    }

    #[test]
    fn default_config_builds_seeded_simulated_feed() {
        let config = RuntimeConfig::default();
        let feed = MarketFeed::from_config(&config).unwrap();
        assert_eq!(feed.source(), FeedSource::Simulated);
        let prices = feed.current_prices();
        assert_eq!(prices.len(), config.symbols.len());
        assert_eq!(prices["BTC"], 45_000.0);
        assert_eq!(feed.book().len("AAPL"), 1);
    }

    #[tokio::test]
    async fn simulated_refresh_appends_one_sample_per_symbol() {
        let feed = simulated_feed(&["A", "B"], 5);
        for _ in 0..8 {
            let report = feed.refresh().await;
            assert_eq!(report.updated, vec!["A", "B"]);
            assert!(report.failed.is_empty());
        }
        assert_eq!(feed.book().len("A"), 5);
        assert_eq!(feed.history()["B"].len(), 5);
    }

    #[tokio::test]
    async fn symbol_without_source_fails_in_isolation() {
        let assets = vec![SimulatedAsset::new("A", 100.0, 0.01, 0.0)];
        let symbols = vec!["A".to_string(), "B".to_string()];
        let book = PriceBook::new(symbols.iter().cloned(), 10);
        book.record("B", 42.0).unwrap();
        let sim = SimulatedSource::seeded(&assets, 1).unwrap();
        let feed = MarketFeed::new(symbols, book, PriceSource::Simulated(sim));

        let report = feed.refresh().await;
        assert_eq!(report.updated, vec!["A"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].symbol, "B");
        assert_eq!(feed.current_prices()["B"], 42.0);
    }

    #[tokio::test]
    async fn unreachable_exchange_keeps_last_prices() {
        let symbols = vec!["BTC".to_string()];
        let book = PriceBook::new(symbols.iter().cloned(), 10);
        book.record("BTC", 45_000.0).unwrap();
        let source = PriceSource::Binance {
            client: BinanceClient::new("http://127.0.0.1:9").unwrap(),
            quote_asset: "USDT".into(),
            kline_interval: "1m".into(),
        };
        let feed = MarketFeed::new(symbols, book, source);

        let report = feed.refresh().await;
        assert!(report.updated.is_empty());
        assert_eq!(report.failed[0].symbol, "BTC");
        assert_eq!(feed.history()["BTC"], vec![45_000.0]);

        let warm = feed.warm_up().await;
        assert_eq!(warm.failed.len(), 1);
        assert_eq!(feed.history()["BTC"], vec![45_000.0]);
    }

    #[tokio::test]
    async fn simulated_warm_up_is_a_noop() {
        let feed = simulated_feed(&["A"], 5);
        let report = feed.warm_up().await;
        assert!(report.updated.is_empty() && report.failed.is_empty());
    }
}
