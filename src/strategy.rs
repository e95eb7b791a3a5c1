// =============================================================================
// Strategy Arbiter — first-match-wins rule evaluation per instrument
// =============================================================================
//
// Each tick, every instrument is run through an ordered table of rules.  The
// first rule whose condition holds decides BUY or SELL and the remaining rules
// are not consulted for that instrument this tick.
//
// Rule order (fixed):
//   1. RiskExit          — only with an open position; take-profit / stop-loss
//                          measured against the 20-sample SMA
//   2. MeanReversion     — deviation from the 10-sample SMA
//   3. SmaCrossover      — fast (5) vs slow (20) SMA with a conviction buffer
//   4. RsiExtremes       — RSI(14) below 20 / above 80
//   5. BollingerTouch    — price at or through the 20 / 2σ bands
//   6. MacdCrossover     — MACD crossing its signal line on this sample
//   7. MomentumBreakout  — price clearing the preceding 20-sample range
//
// Nothing fires => HOLD.  Every threshold comes from `StrategyParams`; rules
// can be switched off individually through the runtime config flags.
// =============================================================================

use serde::Serialize;

use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::extrema::{trailing_extrema, WindowConvention};
use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::sma::{calculate_sma, deviation_from_sma};
use crate::runtime_config::{RuntimeConfig, StrategyParams};
use crate::types::Side;

// =============================================================================
// Rules & decisions
// =============================================================================

/// The strategy rules, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyRule {
    RiskExit,
    MeanReversion,
    SmaCrossover,
    RsiExtremes,
    BollingerTouch,
    MacdCrossover,
    MomentumBreakout,
}

impl StrategyRule {
    /// Every rule, highest priority first.
    pub const ORDERED: [StrategyRule; 7] = [
        StrategyRule::RiskExit,
        StrategyRule::MeanReversion,
        StrategyRule::SmaCrossover,
        StrategyRule::RsiExtremes,
        StrategyRule::BollingerTouch,
        StrategyRule::MacdCrossover,
        StrategyRule::MomentumBreakout,
    ];

    /// Whether the runtime config has this rule switched on.
    pub fn is_enabled(self, config: &RuntimeConfig) -> bool {
        match self {
            Self::RiskExit => config.enable_risk_exit,
            Self::MeanReversion => config.enable_mean_reversion,
            Self::SmaCrossover => config.enable_sma_crossover,
            Self::RsiExtremes => config.enable_rsi_extremes,
            Self::BollingerTouch => config.enable_bollinger_touch,
            Self::MacdCrossover => config.enable_macd_crossover,
            Self::MomentumBreakout => config.enable_momentum_breakout,
        }
    }

    /// Evaluate this rule alone.  `None` means the condition does not hold.
    fn evaluate(self, ctx: &RuleContext<'_>, params: &StrategyParams) -> Option<(Side, String)> {
        match self {
            Self::RiskExit => risk_exit(ctx, params),
            Self::MeanReversion => mean_reversion(ctx, params),
            Self::SmaCrossover => sma_crossover(ctx, params),
            Self::RsiExtremes => rsi_extremes(ctx, params),
            Self::BollingerTouch => bollinger_touch(ctx, params),
            Self::MacdCrossover => macd_crossover(ctx, params),
            Self::MomentumBreakout => momentum_breakout(ctx, params),
        }
    }
}

impl std::fmt::Display for StrategyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RiskExit => write!(f, "RiskExit"),
            Self::MeanReversion => write!(f, "MeanReversion"),
            Self::SmaCrossover => write!(f, "SmaCrossover"),
            Self::RsiExtremes => write!(f, "RsiExtremes"),
            Self::BollingerTouch => write!(f, "BollingerTouch"),
            Self::MacdCrossover => write!(f, "MacdCrossover"),
            Self::MomentumBreakout => write!(f, "MomentumBreakout"),
        }
    }
}

/// Verdict for one instrument on one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Hold,
    Buy {
        symbol: String,
        rule: StrategyRule,
        reason: String,
    },
    Sell {
        symbol: String,
        rule: StrategyRule,
        reason: String,
    },
}

impl Decision {
    fn from_signal(symbol: &str, rule: StrategyRule, side: Side, reason: String) -> Self {
        let symbol = symbol.to_string();
        match side {
            Side::Buy => Self::Buy { symbol, rule, reason },
            Side::Sell => Self::Sell { symbol, rule, reason },
        }
    }

    /// "BUY", "SELL" or "HOLD".
    pub fn action(&self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Buy { .. } => "BUY",
            Self::Sell { .. } => "SELL",
        }
    }

    pub fn rule(&self) -> Option<StrategyRule> {
        match self {
            Self::Hold => None,
            Self::Buy { rule, .. } | Self::Sell { rule, .. } => Some(*rule),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Hold => None,
            Self::Buy { reason, .. } | Self::Sell { reason, .. } => Some(reason),
        }
    }
}

/// Inputs shared by every rule for one instrument.
struct RuleContext<'a> {
    price: f64,
    /// Oldest-first; the last sample is the current price.
    history: &'a [f64],
    holding: f64,
}

// =============================================================================
// Arbiter
// =============================================================================

/// Ordered rule table plus the thresholds it runs with.
#[derive(Debug, Clone)]
pub struct StrategyArbiter {
    params: StrategyParams,
    rules: Vec<StrategyRule>,
}

impl StrategyArbiter {
    /// Build an arbiter running `rules` in the given order.
    pub fn new(params: StrategyParams, rules: Vec<StrategyRule>) -> Self {
        Self { params, rules }
    }

    /// Build an arbiter from the runtime config: canonical order, disabled
    /// rules dropped.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let rules = StrategyRule::ORDERED
            .into_iter()
            .filter(|rule| rule.is_enabled(config))
            .collect();
        Self::new(config.strategy_params.clone(), rules)
    }

    pub fn min_lookback(&self) -> usize {
        self.params.min_lookback
    }

    pub fn rules(&self) -> &[StrategyRule] {
        &self.rules
    }

    /// `true` when `history` is long enough for the rules to run.
    pub fn has_enough_history(&self, history: &[f64]) -> bool {
        history.len() >= self.params.min_lookback
    }

    /// Decide what to do with `symbol` at `price`.
    ///
    /// `history` is the instrument's bounded price history (oldest first, the
    /// last sample being `price`); `holding` is the quantity currently held.
    /// Returns [`Decision::Hold`] when history is shorter than the minimum
    /// lookback or no rule fires.
    pub fn decide(&self, symbol: &str, price: f64, history: &[f64], holding: f64) -> Decision {
        if !self.has_enough_history(history) {
            return Decision::Hold;
        }

        let ctx = RuleContext {
            price,
            history,
            holding,
        };

        self.rules
            .iter()
            .find_map(|&rule| {
                rule.evaluate(&ctx, &self.params)
                    .map(|(side, reason)| Decision::from_signal(symbol, rule, side, reason))
            })
            .unwrap_or(Decision::Hold)
    }
}

// =============================================================================
// Rule conditions
// =============================================================================

fn risk_exit(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    if ctx.holding <= 0.0 {
        return None;
    }
    let dev = deviation_from_sma(ctx.history, p.risk_exit_sma_period, ctx.price)?;
    let n = p.risk_exit_sma_period;

    if dev >= p.take_profit_pct / 100.0 {
        Some((
            Side::Sell,
            format!("Take Profit: price is {:.2}% above {n}-period SMA.", dev * 100.0),
        ))
    } else if dev <= -p.stop_loss_pct / 100.0 {
        Some((
            Side::Sell,
            format!("Stop Loss: price is {:.2}% below {n}-period SMA.", -dev * 100.0),
        ))
    } else {
        None
    }
}

fn mean_reversion(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    let dev = deviation_from_sma(ctx.history, p.mean_reversion_period, ctx.price)?;
    let band = p.mean_reversion_band_pct / 100.0;
    let n = p.mean_reversion_period;

    if dev < -band {
        Some((
            Side::Buy,
            format!("Mean Reversion: price is {:.2}% below {n}-period average.", -dev * 100.0),
        ))
    } else if dev > band {
        Some((
            Side::Sell,
            format!("Mean Reversion: price is {:.2}% above {n}-period average.", dev * 100.0),
        ))
    } else {
        None
    }
}

fn sma_crossover(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    let fast = calculate_sma(ctx.history, p.crossover_fast_period)?;
    let slow = calculate_sma(ctx.history, p.crossover_slow_period)?;
    if slow == 0.0 {
        return None;
    }
    let buffer = p.crossover_buffer_pct / 100.0;
    let spread_pct = (fast - slow) / slow * 100.0;
    let (f, s) = (p.crossover_fast_period, p.crossover_slow_period);

    if fast > slow * (1.0 + buffer) {
        Some((
            Side::Buy,
            format!("SMA Crossover: fast SMA({f}) is {spread_pct:.2}% above slow SMA({s})."),
        ))
    } else if fast < slow * (1.0 - buffer) {
        Some((
            Side::Sell,
            format!("SMA Crossover: fast SMA({f}) is {:.2}% below slow SMA({s}).", -spread_pct),
        ))
    } else {
        None
    }
}

fn rsi_extremes(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    let rsi = calculate_rsi(ctx.history, p.rsi_period);

    if rsi < p.rsi_oversold {
        Some((Side::Buy, format!("Extreme RSI: oversold at RSI {rsi:.2}.")))
    } else if rsi > p.rsi_overbought {
        Some((Side::Sell, format!("Extreme RSI: overbought at RSI {rsi:.2}.")))
    } else {
        None
    }
}

fn bollinger_touch(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    let bands = calculate_bollinger(ctx.history, p.bollinger_period, p.bollinger_num_std)?;
    // A zero-width band means no volatility; touching it carries no signal.
    if bands.width <= 0.0 {
        return None;
    }

    if ctx.price <= bands.lower {
        let dev = (bands.lower - ctx.price) / bands.lower * 100.0;
        Some((
            Side::Buy,
            format!(
                "Bollinger Touch: price is {dev:.2}% below lower band ({:.4}, width {:.2}%).",
                bands.lower, bands.width
            ),
        ))
    } else if ctx.price >= bands.upper {
        let dev = (ctx.price - bands.upper) / bands.upper * 100.0;
        Some((
            Side::Sell,
            format!(
                "Bollinger Touch: price is {dev:.2}% above upper band ({:.4}, width {:.2}%).",
                bands.upper, bands.width
            ),
        ))
    } else {
        None
    }
}

fn macd_crossover(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    let macd = calculate_macd(ctx.history, p.macd_fast, p.macd_slow, p.macd_signal)?;

    if macd.crossed_above() {
        Some((
            Side::Buy,
            format!(
                "MACD Crossover: MACD {:.4} crossed above signal {:.4} (histogram {:+.4}).",
                macd.macd, macd.signal, macd.histogram
            ),
        ))
    } else if macd.crossed_below() {
        Some((
            Side::Sell,
            format!(
                "MACD Crossover: MACD {:.4} crossed below signal {:.4} (histogram {:+.4}).",
                macd.macd, macd.signal, macd.histogram
            ),
        ))
    } else {
        None
    }
}

fn momentum_breakout(ctx: &RuleContext<'_>, p: &StrategyParams) -> Option<(Side, String)> {
    let range = trailing_extrema(
        ctx.history,
        p.breakout_period,
        WindowConvention::PrecedingCurrent,
    )?;
    let buffer = p.breakout_buffer_pct / 100.0;
    let n = p.breakout_period;

    if ctx.price > range.high * (1.0 + buffer) {
        let dev = (ctx.price - range.high) / range.high * 100.0;
        Some((
            Side::Buy,
            format!("Momentum Breakout: price cleared {n}-period high by {dev:.2}%."),
        ))
    } else if ctx.price < range.low * (1.0 - buffer) {
        let dev = (range.low - ctx.price) / range.low * 100.0;
        Some((
            Side::Sell,
            format!("Momentum Breakdown: price fell through {n}-period low by {dev:.2}%."),
        ))
    } else {
        None
    }
}
