// =============================================================================
// Portfolio Ledger — capital, holdings, trade log and valuation curve
// =============================================================================
//
// The ledger is plain owned data.  It is shared behind a
// `parking_lot::RwLock` by the trading engine; readers (status / history)
// take the read guard, and only the tick executor mutates it through the
// position manager.
//
// Invariants:
//   - capital >= 0 and every holding >= 0 (no leverage, no shorts)
//   - holdings cover exactly the configured universe
//   - trade ids start at 1 and strictly increase
//   - the valuation history never exceeds its bound; oldest evicted first
//   - total value is always derived from the prices handed in, never cached
// =============================================================================

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Side;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One executed trade.  Field names follow the dashboard's JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: u64,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    /// Notional value of the trade (quantity * price).
    pub total: f64,
    pub reason: String,
}

/// Portfolio value at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValuationSnapshot {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "value")]
    pub total_value: f64,
}

/// Fixed-field answer to a status query.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub capital: f64,
    #[serde(rename = "portfolio")]
    pub holdings: BTreeMap<String, f64>,
    pub total_value: f64,
    #[serde(rename = "trade_history")]
    pub recent_trades: Vec<Trade>,
    #[serde(rename = "capital_history")]
    pub valuation_history: Vec<ValuationSnapshot>,
}

/// Fixed-field answer to a history query.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    #[serde(rename = "capital")]
    pub valuation_history: Vec<ValuationSnapshot>,
    pub trades: Vec<Trade>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    capital: f64,
    holdings: BTreeMap<String, f64>,
    trades: Vec<Trade>,
    next_trade_id: u64,
    valuations: VecDeque<ValuationSnapshot>,
    max_valuations: usize,
}

impl PortfolioLedger {
    /// Create a ledger holding `initial_capital` in cash and a zero position
    /// in every symbol of the universe.
    ///
    /// The valuation curve starts with one snapshot worth the initial capital.
    pub fn new<I, S>(initial_capital: f64, universe: I, max_valuations: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capital = initial_capital.max(0.0);
        let max_valuations = max_valuations.max(1);
        let holdings = universe.into_iter().map(|s| (s.into(), 0.0)).collect();

        let mut valuations = VecDeque::with_capacity(max_valuations + 1);
        valuations.push_back(ValuationSnapshot {
            timestamp: Utc::now(),
            total_value: capital,
        });

        Self {
            capital,
            holdings,
            trades: Vec::new(),
            next_trade_id: 1,
            valuations,
            max_valuations,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn capital(&self) -> f64 {
        self.capital
    }

    /// Quantity held of `symbol` (0 for unknown symbols).
    pub fn holding(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn holdings(&self) -> &BTreeMap<String, f64> {
        &self.holdings
    }

    /// Number of instruments with a strictly positive holding.
    pub fn open_position_count(&self) -> usize {
        self.holdings.values().filter(|&&q| q > 0.0).count()
    }

    #[cfg(test)]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    #[cfg(test)]
    pub fn valuations(&self) -> impl ExactSizeIterator<Item = &ValuationSnapshot> {
        self.valuations.iter()
    }

    /// capital + Σ(holding × price).  Holdings without a known price
    /// contribute nothing.
    pub fn total_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.capital
            + self
                .holdings
                .iter()
                .filter_map(|(symbol, &qty)| prices.get(symbol).map(|p| qty * p))
                .sum::<f64>()
    }

    /// Snapshot for status reporting with the `trade_limit` most recent trades.
    pub fn status(&self, prices: &HashMap<String, f64>, trade_limit: usize) -> Status {
        let start = self.trades.len().saturating_sub(trade_limit);
        Status {
            capital: self.capital,
            holdings: self.holdings.clone(),
            total_value: self.total_value(prices),
            recent_trades: self.trades[start..].to_vec(),
            valuation_history: self.valuations.iter().copied().collect(),
        }
    }

    /// Full valuation curve and full trade log.
    pub fn history(&self) -> HistoryReport {
        HistoryReport {
            valuation_history: self.valuations.iter().copied().collect(),
            trades: self.trades.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Compute the current total value and push it onto the valuation curve,
    /// evicting the oldest snapshot past the bound.
    pub fn append_valuation(&mut self, prices: &HashMap<String, f64>) -> ValuationSnapshot {
        let snapshot = ValuationSnapshot {
            timestamp: Utc::now(),
            total_value: self.total_value(prices),
        };
        self.valuations.push_back(snapshot);
        while self.valuations.len() > self.max_valuations {
            self.valuations.pop_front();
        }
        snapshot
    }

    /// Debit `spend` from capital, credit `quantity` of `symbol`, and log the
    /// trade.  Callers validate sizing first; this only applies the effect.
    pub(crate) fn apply_buy(
        &mut self,
        symbol: &str,
        price: f64,
        spend: f64,
        quantity: f64,
        reason: &str,
    ) -> Trade {
        self.capital = (self.capital - spend).max(0.0);
        *self.holdings.entry(symbol.to_string()).or_insert(0.0) += quantity;
        self.record_trade(symbol, Side::Buy, quantity, price, spend, reason)
    }

    /// Close the whole position in `symbol` at `price` and log the trade.
    pub(crate) fn apply_sell(&mut self, symbol: &str, price: f64, reason: &str) -> Trade {
        let quantity = self.holding(symbol);
        let revenue = quantity * price;
        self.capital += revenue;
        self.holdings.insert(symbol.to_string(), 0.0);
        self.record_trade(symbol, Side::Sell, quantity, price, revenue, reason)
    }

    fn record_trade(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
        total: f64,
        reason: &str,
    ) -> Trade {
        let trade = Trade {
            id: self.next_trade_id,
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            total,
            reason: reason.to_string(),
        };
        self.next_trade_id += 1;
        self.trades.push(trade.clone());
        trade
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn new_ledger_covers_universe() {
        let ledger = PortfolioLedger::new(1_000.0, ["AAPL", "BTC"], 10);
        assert_eq!(ledger.holdings().len(), 2);
        assert_eq!(ledger.holding("AAPL"), 0.0);
        assert_eq!(ledger.open_position_count(), 0);
        assert_eq!(ledger.valuations().len(), 1);
        assert_eq!(ledger.valuations().next().unwrap().total_value, 1_000.0);
    }

    #[test]
    fn total_value_reconciles() {
        let mut ledger = PortfolioLedger::new(1_000.0, ["AAPL", "BTC"], 10);
        ledger.apply_buy("AAPL", 100.0, 500.0, 5.0, "test");
        let p = prices(&[("AAPL", 110.0), ("BTC", 40_000.0)]);
        let expected = ledger.capital() + 5.0 * 110.0;
        assert!((ledger.total_value(&p) - expected).abs() < 1e-9);
        assert!((ledger.status(&p, 20).total_value - 1_050.0).abs() < 1e-9);
    }

    #[test]
    fn trade_ids_strictly_increase() {
        let mut ledger = PortfolioLedger::new(10_000.0, ["AAPL", "BTC"], 10);
        let a = ledger.apply_buy("AAPL", 100.0, 1_000.0, 10.0, "a");
        let b = ledger.apply_buy("BTC", 50.0, 1_000.0, 20.0, "b");
        let c = ledger.apply_sell("AAPL", 120.0, "c");
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
    }

    #[test]
    fn sell_liquidates_whole_position() {
        let mut ledger = PortfolioLedger::new(1_000.0, ["AAPL"], 10);
        ledger.apply_buy("AAPL", 100.0, 500.0, 5.0, "in");
        let trade = ledger.apply_sell("AAPL", 120.0, "out");
        assert_eq!(trade.side, Side::Sell);
        assert!((trade.quantity - 5.0).abs() < 1e-12);
        assert!((trade.total - 600.0).abs() < 1e-9);
        assert_eq!(ledger.holding("AAPL"), 0.0);
        assert!((ledger.capital() - 1_100.0).abs() < 1e-9);
    }

    #[test]
    fn valuation_history_is_fifo_bounded() {
        let mut ledger = PortfolioLedger::new(100.0, ["AAPL"], 3);
        let p = prices(&[("AAPL", 1.0)]);
        for _ in 0..10 {
            ledger.append_valuation(&p);
            assert!(ledger.valuations().len() <= 3);
        }
        assert_eq!(ledger.valuations().len(), 3);

        // Newest snapshot sits at the back.
        ledger.apply_buy("AAPL", 1.0, 50.0, 50.0, "x");
        let mut p2 = p.clone();
        p2.insert("AAPL".into(), 3.0);
        let last = ledger.append_valuation(&p2);
        assert!((last.total_value - 200.0).abs() < 1e-9);
        assert_eq!(ledger.valuations().last().unwrap().total_value, last.total_value);
        assert_eq!(ledger.valuations().len(), 3);
    }

    #[test]
    fn status_returns_recent_suffix_of_trades() {
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL"], 10);
        for _ in 0..5 {
            ledger.apply_buy("AAPL", 10.0, 100.0, 10.0, "b");
            ledger.apply_sell("AAPL", 10.0, "s");
        }
        let status = ledger.status(&prices(&[("AAPL", 10.0)]), 3);
        let ids: Vec<u64> = status.recent_trades.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![8, 9, 10]);
        assert_eq!(ledger.history().trades.len(), 10);
    }

    #[test]
    fn status_serialises_with_dashboard_names() {
        let ledger = PortfolioLedger::new(100.0, ["AAPL"], 10);
        let json = serde_json::to_value(ledger.status(&HashMap::new(), 20)).unwrap();
        for key in ["capital", "portfolio", "total_value", "trade_history", "capital_history"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        let history = serde_json::to_value(ledger.history()).unwrap();
        assert!(history.get("capital").is_some());
        assert!(history.get("trades").is_some());
    }
}
