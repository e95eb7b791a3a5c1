// =============================================================================
// Position Engine — sizing, diversification and execution against the ledger
// =============================================================================
//
// BUY:
//   1. Diversification cap      -> reject when `max_open_positions` are held
//   2. No averaging-in          -> reject when the symbol is already held
//   3. Size                     -> `position_size_pct` of the *current* total
//                                  value, clamped to available capital
//   4. Minimum trade size       -> reject below `min_trade_size`
//
// SELL:
//   Liquidates the whole position; a SELL with nothing held is a no-op.
//
// Every operation either applies fully or not at all.  Total value is
// recomputed from the ledger on each BUY, so trades executed earlier in the
// same tick are reflected in later sizing.
// =============================================================================

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::ledger::{PortfolioLedger, Trade};
use crate::runtime_config::RuntimeConfig;
use crate::strategy::Decision;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a BUY or SELL was not executed.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum TradeRejection {
    #[error("diversification cap reached: {open} of {max} positions open")]
    CapacityExceeded { open: usize, max: usize },

    #[error("already holding {quantity} {symbol}")]
    AlreadyHolding { symbol: String, quantity: f64 },

    #[error("trade size {spend:.2} below minimum {minimum:.2}")]
    InvalidTradeSize { spend: f64, minimum: f64 },

    #[error("no holdings of {symbol} to sell")]
    NoHoldings { symbol: String },
}

/// Outcome of executing one decision.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// The trade was applied to the ledger.
    Filled(Trade),
    /// The decision was valid but a constraint blocked it.
    Rejected(TradeRejection),
    /// HOLD: nothing to execute.
    Skipped,
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filled(trade) => write!(
                f,
                "Filled(#{} {} {} qty={:.6} @ {:.4})",
                trade.id, trade.side, trade.symbol, trade.quantity, trade.price
            ),
            Self::Rejected(reason) => write!(f, "Rejected({reason})"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Position Manager
// ---------------------------------------------------------------------------

/// Sizing rules applied to every BUY.
#[derive(Debug, Clone)]
pub struct PositionManager {
    max_open_positions: usize,
    /// Fraction of total value spent per BUY (0.1 == 10 %).
    position_fraction: f64,
    min_trade_size: f64,
}

impl PositionManager {
    pub fn new(max_open_positions: usize, position_size_pct: f64, min_trade_size: f64) -> Self {
        Self {
            max_open_positions,
            position_fraction: position_size_pct / 100.0,
            min_trade_size,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            config.max_open_positions,
            config.position_size_pct,
            config.min_trade_size,
        )
    }

    /// Route a strategy decision to [`buy`](Self::buy) or [`sell`](Self::sell).
    ///
    /// `prices` must contain the price of every held instrument so BUY sizing
    /// sees the true current total value.
    pub fn execute(
        &self,
        ledger: &mut PortfolioLedger,
        decision: &Decision,
        price: f64,
        prices: &HashMap<String, f64>,
    ) -> ExecutionResult {
        let outcome = match decision {
            Decision::Hold => return ExecutionResult::Skipped,
            Decision::Buy { symbol, reason, .. } => self.buy(ledger, symbol, price, reason, prices),
            Decision::Sell { symbol, reason, .. } => self.sell(ledger, symbol, price, reason),
        };

        match outcome {
            Ok(trade) => ExecutionResult::Filled(trade),
            Err(rejection) => ExecutionResult::Rejected(rejection),
        }
    }

    /// Open a new position in `symbol` sized from the current total value.
    pub fn buy(
        &self,
        ledger: &mut PortfolioLedger,
        symbol: &str,
        price: f64,
        reason: &str,
        prices: &HashMap<String, f64>,
    ) -> Result<Trade, TradeRejection> {
        let open = ledger.open_position_count();
        if open >= self.max_open_positions {
            debug!(symbol, open, max = self.max_open_positions, "BUY rejected: capacity");
            return Err(TradeRejection::CapacityExceeded {
                open,
                max: self.max_open_positions,
            });
        }

        let held = ledger.holding(symbol);
        if held > 0.0 {
            debug!(symbol, held, "BUY rejected: already holding");
            return Err(TradeRejection::AlreadyHolding {
                symbol: symbol.to_string(),
                quantity: held,
            });
        }

        let total_value = ledger.total_value(prices);
        let spend = (total_value * self.position_fraction).min(ledger.capital());
        if spend < self.min_trade_size || spend <= 0.0 {
            debug!(symbol, spend, minimum = self.min_trade_size, "BUY rejected: trade size");
            return Err(TradeRejection::InvalidTradeSize {
                spend,
                minimum: self.min_trade_size,
            });
        }

        let quantity = spend / price;
        let trade = ledger.apply_buy(symbol, price, spend, quantity, reason);

        info!(
            id = trade.id,
            symbol,
            price,
            quantity,
            spend,
            total_value,
            reason,
            "BUY executed"
        );

        Ok(trade)
    }

    /// Liquidate the entire position in `symbol`.
    pub fn sell(
        &self,
        ledger: &mut PortfolioLedger,
        symbol: &str,
        price: f64,
        reason: &str,
    ) -> Result<Trade, TradeRejection> {
        if ledger.holding(symbol) <= 0.0 {
            debug!(symbol, "SELL rejected: nothing held");
            return Err(TradeRejection::NoHoldings {
                symbol: symbol.to_string(),
            });
        }

        let trade = ledger.apply_sell(symbol, price, reason);

        info!(
            id = trade.id,
            symbol,
            price,
            quantity = trade.quantity,
            revenue = trade.total,
            reason,
            "SELL executed"
        );

        Ok(trade)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRule;
    use crate::types::Side;

    fn manager() -> PositionManager {
        PositionManager::new(10, 10.0, 500.0)
    }

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("SYM{i}")).collect()
    }

    fn flat_prices(symbols: &[String], price: f64) -> HashMap<String, f64> {
        symbols.iter().map(|s| (s.clone(), price)).collect()
    }

    #[test]
    fn buy_spends_ten_percent_of_total_value() {
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL"], 10);
        let prices = flat_prices(&["AAPL".into()], 200.0);

        let trade = manager().buy(&mut ledger, "AAPL", 200.0, "test", &prices).unwrap();
        assert_eq!(trade.side, Side::Buy);
        assert!((trade.total - 10_000.0).abs() < 1e-9);
        assert!((trade.quantity - 50.0).abs() < 1e-9);
        assert!((ledger.capital() - 90_000.0).abs() < 1e-9);
        assert!((ledger.holding("AAPL") - 50.0).abs() < 1e-9);
    }

    #[test]
    fn buy_sizing_uses_current_total_value() {
        // Second BUY sees the first position marked at the current price.
        let syms = symbols(2);
        let mut ledger = PortfolioLedger::new(100_000.0, syms.clone(), 10);
        let mut prices = flat_prices(&syms, 100.0);

        manager().buy(&mut ledger, "SYM0", 100.0, "a", &prices).unwrap();
        prices.insert("SYM0".into(), 200.0); // position now worth 20 000
        let trade = manager().buy(&mut ledger, "SYM1", 100.0, "b", &prices).unwrap();

        // total = 90 000 cash + 20 000 position = 110 000 => 11 000
        assert!((trade.total - 11_000.0).abs() < 1e-9);
    }

    #[test]
    fn buy_rejected_below_minimum_after_clamp() {
        // 100 000 of value but only 300 in cash: clamped spend 300 < 500.
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL", "BTC"], 10);
        let prices = flat_prices(&["AAPL".into(), "BTC".into()], 1.0);
        ledger.apply_buy("BTC", 1.0, 99_700.0, 99_700.0, "setup");

        let before = ledger.clone();
        let err = manager().buy(&mut ledger, "AAPL", 10.0, "x", &prices).unwrap_err();
        assert_eq!(
            err,
            TradeRejection::InvalidTradeSize {
                spend: 300.0,
                minimum: 500.0
            }
        );
        assert_eq!(ledger.trades(), before.trades());
        assert_eq!(ledger.capital(), before.capital());
    }

    #[test]
    fn buy_clamps_to_available_capital() {
        let mut ledger = PortfolioLedger::new(10_000.0, ["AAPL", "BTC"], 10);
        let prices = flat_prices(&["AAPL".into(), "BTC".into()], 1.0);
        ledger.apply_buy("BTC", 1.0, 9_200.0, 9_200.0, "setup");

        let trade = manager().buy(&mut ledger, "AAPL", 1.0, "x", &prices).unwrap();
        assert!((trade.total - 800.0).abs() < 1e-9);
        assert_eq!(ledger.capital(), 0.0);
    }

    #[test]
    fn buy_rejected_when_already_holding() {
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL"], 10);
        let prices = flat_prices(&["AAPL".into()], 100.0);
        manager().buy(&mut ledger, "AAPL", 100.0, "a", &prices).unwrap();

        let err = manager().buy(&mut ledger, "AAPL", 100.0, "b", &prices).unwrap_err();
        assert!(matches!(err, TradeRejection::AlreadyHolding { .. }));
        assert_eq!(ledger.trades().len(), 1);
    }

    #[test]
    fn eleventh_buy_hits_diversification_cap() {
        let syms = symbols(11);
        let mut ledger = PortfolioLedger::new(1_000_000.0, syms.clone(), 10);
        let prices = flat_prices(&syms, 10.0);
        let pm = manager();

        for s in &syms[..10] {
            pm.buy(&mut ledger, s, 10.0, "fill", &prices).unwrap();
        }
        assert_eq!(ledger.open_position_count(), 10);

        let before = ledger.clone();
        let err = pm.buy(&mut ledger, "SYM10", 10.0, "one too many", &prices).unwrap_err();
        assert_eq!(err, TradeRejection::CapacityExceeded { open: 10, max: 10 });
        assert_eq!(ledger.trades(), before.trades());
        assert_eq!(ledger.capital(), before.capital());
        assert_eq!(ledger.holdings(), before.holdings());
    }

    #[test]
    fn sell_without_holdings_is_noop() {
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL"], 10);
        let before = ledger.clone();

        let err = manager().sell(&mut ledger, "AAPL", 100.0, "nothing").unwrap_err();
        assert_eq!(err, TradeRejection::NoHoldings { symbol: "AAPL".into() });
        assert_eq!(ledger.capital(), before.capital());
        assert_eq!(ledger.holdings(), before.holdings());
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn sell_liquidates_and_frees_a_slot() {
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL"], 10);
        let prices = flat_prices(&["AAPL".into()], 100.0);
        let pm = manager();
        pm.buy(&mut ledger, "AAPL", 100.0, "in", &prices).unwrap();

        let trade = pm.sell(&mut ledger, "AAPL", 110.0, "out").unwrap();
        assert!((trade.quantity - 100.0).abs() < 1e-9);
        assert!((trade.total - 11_000.0).abs() < 1e-9);
        assert!((ledger.capital() - 101_000.0).abs() < 1e-9);
        assert_eq!(ledger.open_position_count(), 0);
    }

    #[test]
    fn execute_routes_decisions() {
        let mut ledger = PortfolioLedger::new(100_000.0, ["AAPL"], 10);
        let prices = flat_prices(&["AAPL".into()], 100.0);
        let pm = manager();

        assert_eq!(
            pm.execute(&mut ledger, &Decision::Hold, 100.0, &prices),
            ExecutionResult::Skipped
        );

        let buy = Decision::Buy {
            symbol: "AAPL".into(),
            rule: StrategyRule::MeanReversion,
            reason: "dip".into(),
        };
        let result = pm.execute(&mut ledger, &buy, 100.0, &prices);
        assert!(matches!(result, ExecutionResult::Filled(ref t) if t.reason == "dip"));

        let sell = Decision::Sell {
            symbol: "AAPL".into(),
            rule: StrategyRule::RiskExit,
            reason: "exit".into(),
        };
        assert!(matches!(
            pm.execute(&mut ledger, &sell, 100.0, &prices),
            ExecutionResult::Filled(_)
        ));
        assert!(matches!(
            pm.execute(&mut ledger, &sell, 100.0, &prices),
            ExecutionResult::Rejected(TradeRejection::NoHoldings { .. })
        ));
    }
}
