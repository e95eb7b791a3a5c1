// =============================================================================
// Trading Engine — per-tick decision and execution loop
// =============================================================================
//
// One tick:
//   1. Snapshot current prices and histories from the feed (no I/O here;
//      the feed was refreshed beforehand).
//   2. Take the ledger write guard for the whole decision phase so readers
//      only ever observe pre-tick or post-tick state.
//   3. For every configured symbol, in configured order:
//        - skip it if it has never been priced
//        - HOLD if history is shorter than the minimum lookback
//        - otherwise arbitrate a decision and execute it
//   4. Append one valuation snapshot.
//
// One symbol's outcome never aborts the tick.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decision_envelope::DecisionEnvelope;
use crate::ledger::{HistoryReport, PortfolioLedger, Status, Trade, ValuationSnapshot};
use crate::market_data::PriceFeed;
use crate::position_engine::{ExecutionResult, PositionManager};
use crate::runtime_config::RuntimeConfig;
use crate::strategy::StrategyArbiter;

/// Summary of one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// One envelope per evaluated symbol, in evaluation order.
    pub decisions: Vec<DecisionEnvelope>,
    /// Trades executed during this tick.
    pub trades: Vec<Trade>,
    /// Symbols skipped because no price was known.
    pub unpriced: Vec<String>,
    pub valuation: ValuationSnapshot,
}

pub struct TradingEngine {
    symbols: Vec<String>,
    ledger: RwLock<PortfolioLedger>,
    arbiter: StrategyArbiter,
    positions: PositionManager,
    status_trade_limit: usize,
    tick_count: AtomicU64,
}

impl TradingEngine {
    pub fn new(
        symbols: Vec<String>,
        ledger: PortfolioLedger,
        arbiter: StrategyArbiter,
        positions: PositionManager,
        status_trade_limit: usize,
    ) -> Self {
        Self {
            symbols,
            ledger: RwLock::new(ledger),
            arbiter,
            positions,
            status_trade_limit,
            tick_count: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        let ledger = PortfolioLedger::new(
            config.initial_capital,
            config.symbols.iter().cloned(),
            config.valuation_history_len,
        );
        let arbiter = StrategyArbiter::from_config(config);

        info!(
            symbols = ?config.symbols,
            initial_capital = config.initial_capital,
            rules = ?arbiter.rules(),
            min_lookback = arbiter.min_lookback(),
            "trading engine initialised"
        );

        Self::new(
            config.symbols.clone(),
            ledger,
            arbiter,
            PositionManager::from_config(config),
            config.status_trade_limit,
        )
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Evaluate every symbol once against the feed's current snapshot and
    /// apply the resulting trades.
    pub fn run_tick(&self, feed: &dyn PriceFeed) -> TickReport {
        let tick = self.tick_count.fetch_add(1, Ordering::SeqCst) + 1;
        let prices = feed.current_prices();
        let history = feed.history();

        let mut decisions = Vec::with_capacity(self.symbols.len());
        let mut trades = Vec::new();
        let mut unpriced = Vec::new();

        let mut ledger = self.ledger.write();

        for symbol in &self.symbols {
            let Some(&price) = prices.get(symbol) else {
                warn!(tick, symbol = %symbol, "no price known; skipping");
                unpriced.push(symbol.clone());
                continue;
            };

            let samples = history.get(symbol).map(Vec::as_slice).unwrap_or_default();
            if !self.arbiter.has_enough_history(samples) {
                debug!(
                    tick,
                    symbol = %symbol,
                    have = samples.len(),
                    need = self.arbiter.min_lookback(),
                    "insufficient history; HOLD"
                );
                decisions.push(DecisionEnvelope::insufficient_history(
                    tick,
                    symbol.as_str(),
                    price,
                    samples.len(),
                    self.arbiter.min_lookback(),
                ));
                continue;
            }

            let decision = self
                .arbiter
                .decide(symbol, price, samples, ledger.holding(symbol));
            let result = self.positions.execute(&mut ledger, &decision, price, &prices);

            debug!(
                tick,
                symbol = %symbol,
                price,
                action = decision.action(),
                result = %result,
                "decision evaluated"
            );

            if let ExecutionResult::Filled(trade) = &result {
                trades.push(trade.clone());
            }
            decisions.push(DecisionEnvelope::from_execution(
                tick,
                symbol.as_str(),
                price,
                &decision,
                &result,
            ));
        }

        let valuation = ledger.append_valuation(&prices);
        let capital = ledger.capital();
        let open_positions = ledger.open_position_count();
        drop(ledger);

        info!(
            tick,
            trades = trades.len(),
            capital,
            open_positions,
            total_value = valuation.total_value,
            "tick complete"
        );

        TickReport {
            tick,
            decisions,
            trades,
            unpriced,
            valuation,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Ledger status valued at the feed's current prices.
    pub fn status(&self, feed: &dyn PriceFeed) -> Status {
        self.status_at(&feed.current_prices())
    }

    /// Ledger status valued at `prices`.
    pub fn status_at(&self, prices: &HashMap<String, f64>) -> Status {
        self.ledger.read().status(prices, self.status_trade_limit)
    }

    pub fn history(&self) -> HistoryReport {
        self.ledger.read().history()
    }
}
