use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use super::{FeedError, PriceFeed};

// ---------------------------------------------------------------------------
// PriceBook -- thread-safe bounded price ring per symbol
// ---------------------------------------------------------------------------

/// Thread-safe ring buffer holding the most recent prices per symbol.
///
/// The universe is fixed at construction; prices for other symbols are
/// rejected.  Every accepted price is finite and strictly positive, and each
/// ring is trimmed to `max_len` with the oldest sample evicted first.
pub struct PriceBook {
    series: RwLock<HashMap<String, VecDeque<f64>>>,
    max_len: usize,
}

impl PriceBook {
    pub fn new<I, S>(symbols: I, max_len: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let max_len = max_len.max(1);
        let series = symbols
            .into_iter()
            .map(|s| (s.into(), VecDeque::with_capacity(max_len + 1)))
            .collect();
        Self {
            series: RwLock::new(series),
            max_len,
        }
    }

    /// Append one price sample for `symbol`.
    pub fn record(&self, symbol: &str, price: f64) -> Result<(), FeedError> {
        validate(symbol, price)?;

        let mut map = self.series.write();
        let ring = map
            .get_mut(symbol)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))?;

        ring.push_back(price);
        while ring.len() > self.max_len {
            ring.pop_front();
        }
        Ok(())
    }

    /// Replace the history of `symbol` with `prices` (oldest first), keeping
    /// the newest `max_len`.  Nothing is written if any sample is invalid.
    pub fn seed(&self, symbol: &str, prices: &[f64]) -> Result<usize, FeedError> {
        for &price in prices {
            validate(symbol, price)?;
        }

        let mut map = self.series.write();
        let ring = map
            .get_mut(symbol)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))?;

        let start = prices.len().saturating_sub(self.max_len);
        ring.clear();
        ring.extend(&prices[start..]);
        Ok(ring.len())
    }

    /// Most recent price of `symbol`, if any.
    #[cfg(test)]
    pub fn latest(&self, symbol: &str) -> Option<f64> {
        self.series.read().get(symbol).and_then(|r| r.back().copied())
    }

    /// Number of samples stored for `symbol`.
    #[cfg(test)]
    pub fn len(&self, symbol: &str) -> usize {
        self.series.read().get(symbol).map_or(0, VecDeque::len)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl PriceFeed for PriceBook {
    fn current_prices(&self) -> HashMap<String, f64> {
        self.series
            .read()
            .iter()
            .filter_map(|(symbol, ring)| ring.back().map(|&p| (symbol.clone(), p)))
            .collect()
    }

    fn history(&self) -> HashMap<String, Vec<f64>> {
        self.series
            .read()
            .iter()
            .map(|(symbol, ring)| (symbol.clone(), ring.iter().copied().collect()))
            .collect()
    }
}

fn validate(symbol: &str, price: f64) -> Result<(), FeedError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(FeedError::InvalidPrice {
            symbol: symbol.to_string(),
            price,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_fifo_bounded() {
        let book = PriceBook::new(["BTC"], 3);
        for p in [1.0, 2.0, 3.0, 4.0, 5.0] {
            book.record("BTC", p).unwrap();
        }
        assert_eq!(book.len("BTC"), 3);
        assert_eq!(book.history()["BTC"], vec![3.0, 4.0, 5.0]);
        assert_eq!(book.latest("BTC"), Some(5.0));
        assert_eq!(book.current_prices()["BTC"], 5.0);
    }

    #[test]
    fn rejects_bad_prices_and_unknown_symbols() {
        let book = PriceBook::new(["BTC"], 10);
        book.record("BTC", 100.0).unwrap();

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                book.record("BTC", bad),
                Err(FeedError::InvalidPrice { .. })
            ));
        }
        assert!(matches!(
            book.record("DOGE", 1.0),
            Err(FeedError::UnknownSymbol(_))
        ));
        // Last good price survives.
        assert_eq!(book.history()["BTC"], vec![100.0]);
    }

    #[test]
    fn unpriced_symbols_absent_from_current_prices() {
        let book = PriceBook::new(["BTC", "ETH"], 10);
        book.record("ETH", 2_500.0).unwrap();
        let prices = book.current_prices();
        assert_eq!(prices.len(), 1);
        assert!(!prices.contains_key("BTC"));
        assert!(book.history()["BTC"].is_empty());
    }

    #[test]
    fn seed_keeps_newest_and_is_all_or_nothing() {
        let book = PriceBook::new(["BTC"], 3);
        assert_eq!(book.seed("BTC", &[1.0, 2.0, 3.0, 4.0]).unwrap(), 3);
        assert_eq!(book.history()["BTC"], vec![2.0, 3.0, 4.0]);

        assert!(book.seed("BTC", &[5.0, f64::NAN]).is_err());
        assert_eq!(book.history()["BTC"], vec![2.0, 3.0, 4.0]);
    }
}
