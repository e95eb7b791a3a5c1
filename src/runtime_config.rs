// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Arbitra engine.  Every tunable parameter
// lives here: the instrument universe, ledger bounds, position sizing, the
// strategy threshold table, per-rule feature flags and the price feed.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::collections::HashSet;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::TradingMode;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    default_assets().into_iter().map(|a| a.symbol).collect()
}

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_tick_interval_secs() -> u64 {
    10
}

fn default_price_history_len() -> usize {
    100
}

fn default_valuation_history_len() -> usize {
    200
}

fn default_status_trade_limit() -> usize {
    20
}

fn default_max_open_positions() -> usize {
    10
}

fn default_position_size_pct() -> f64 {
    10.0
}

fn default_min_trade_size() -> f64 {
    500.0
}

fn default_min_lookback() -> usize {
    30
}

fn default_risk_exit_sma_period() -> usize {
    20
}

fn default_take_profit_pct() -> f64 {
    2.0
}

fn default_stop_loss_pct() -> f64 {
    1.0
}

fn default_mean_reversion_period() -> usize {
    10
}

fn default_mean_reversion_band_pct() -> f64 {
    0.5
}

fn default_crossover_fast_period() -> usize {
    5
}

fn default_crossover_slow_period() -> usize {
    20
}

fn default_crossover_buffer_pct() -> f64 {
    0.1
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_oversold() -> f64 {
    20.0
}

fn default_rsi_overbought() -> f64 {
    80.0
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_num_std() -> f64 {
    2.0
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_breakout_period() -> usize {
    20
}

fn default_breakout_buffer_pct() -> f64 {
    0.1
}

fn default_assets() -> Vec<SimulatedAsset> {
    vec![
        SimulatedAsset::new("AAPL", 180.0, 0.002, 0.0001),
        SimulatedAsset::new("GOOGL", 140.0, 0.003, 0.0001),
        SimulatedAsset::new("BTC", 45_000.0, 0.01, 0.0002),
        SimulatedAsset::new("ETH", 2_500.0, 0.015, 0.0002),
    ]
}

fn default_binance_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_kline_interval() -> String {
    "1m".to_string()
}

// =============================================================================
// StrategyParams
// =============================================================================

/// Threshold table for the strategy arbiter.
///
/// Percentages are expressed in percent units (`0.5` == 0.5 %).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Minimum number of history samples before any rule is evaluated.
    #[serde(default = "default_min_lookback")]
    pub min_lookback: usize,

    /// SMA period the risk exit measures deviation against.
    #[serde(default = "default_risk_exit_sma_period")]
    pub risk_exit_sma_period: usize,

    /// Sell a held position once price is this far above the risk-exit SMA.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,

    /// Sell a held position once price is this far below the risk-exit SMA.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,

    #[serde(default = "default_mean_reversion_period")]
    pub mean_reversion_period: usize,

    /// Deviation from the mean-reversion SMA that triggers a trade.
    #[serde(default = "default_mean_reversion_band_pct")]
    pub mean_reversion_band_pct: f64,

    #[serde(default = "default_crossover_fast_period")]
    pub crossover_fast_period: usize,

    #[serde(default = "default_crossover_slow_period")]
    pub crossover_slow_period: usize,

    /// Separation the fast SMA needs from the slow SMA.
    #[serde(default = "default_crossover_buffer_pct")]
    pub crossover_buffer_pct: f64,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    #[serde(default = "default_bollinger_num_std")]
    pub bollinger_num_std: f64,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    /// Number of samples preceding the current one that define the range.
    #[serde(default = "default_breakout_period")]
    pub breakout_period: usize,

    /// How far price must clear the range high/low.
    #[serde(default = "default_breakout_buffer_pct")]
    pub breakout_buffer_pct: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            min_lookback: default_min_lookback(),
            risk_exit_sma_period: default_risk_exit_sma_period(),
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            mean_reversion_period: default_mean_reversion_period(),
            mean_reversion_band_pct: default_mean_reversion_band_pct(),
            crossover_fast_period: default_crossover_fast_period(),
            crossover_slow_period: default_crossover_slow_period(),
            crossover_buffer_pct: default_crossover_buffer_pct(),
            rsi_period: default_rsi_period(),
            rsi_oversold: default_rsi_oversold(),
            rsi_overbought: default_rsi_overbought(),
            bollinger_period: default_bollinger_period(),
            bollinger_num_std: default_bollinger_num_std(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            breakout_period: default_breakout_period(),
            breakout_buffer_pct: default_breakout_buffer_pct(),
        }
    }
}

// =============================================================================
// Price feed
// =============================================================================

/// Where the engine gets its prices from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FeedSource {
    /// Random-walk prices generated in-process.
    #[default]
    Simulated,
    /// Public Binance spot ticker.
    Binance,
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => write!(f, "Simulated"),
            Self::Binance => write!(f, "Binance"),
        }
    }
}

/// Random-walk parameters for one simulated instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedAsset {
    pub symbol: String,
    /// Starting price.
    pub price: f64,
    /// Standard deviation of the per-tick return.
    pub volatility: f64,
    /// Mean of the per-tick return.
    #[serde(default)]
    pub drift: f64,
}

impl SimulatedAsset {
    pub fn new(symbol: impl Into<String>, price: f64, volatility: f64, drift: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volatility,
            drift,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub source: FeedSource,

    /// Parameters for the simulated source, keyed by symbol.
    #[serde(default = "default_assets")]
    pub simulated_assets: Vec<SimulatedAsset>,

    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,

    /// Quote asset appended to each symbol to form the Binance pair
    /// (`BTC` -> `BTCUSDT`).  Empty means symbols are already full pairs.
    #[serde(default = "default_quote_asset")]
    pub binance_quote_asset: String,

    /// Seed price history from recent klines at startup (Binance only).
    #[serde(default = "default_true")]
    pub warm_up: bool,

    /// Kline interval used for warm-up.
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::default(),
            simulated_assets: default_assets(),
            binance_base_url: default_binance_base_url(),
            binance_quote_asset: default_quote_asset(),
            warm_up: true,
            kline_interval: default_kline_interval(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the Arbitra engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub trading_mode: TradingMode,

    // --- Universe & ledger ---------------------------------------------------

    /// Instruments the engine evaluates, in evaluation order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Maximum price samples retained per instrument.
    #[serde(default = "default_price_history_len")]
    pub price_history_len: usize,

    /// Maximum valuation snapshots retained by the ledger.
    #[serde(default = "default_valuation_history_len")]
    pub valuation_history_len: usize,

    /// Number of most recent trades included in a status report.
    #[serde(default = "default_status_trade_limit")]
    pub status_trade_limit: usize,

    // --- Position sizing -----------------------------------------------------

    /// Diversification cap on concurrently held instruments.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,

    /// Share of total portfolio value spent on each BUY.
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: f64,

    /// BUYs smaller than this notional are rejected.
    #[serde(default = "default_min_trade_size")]
    pub min_trade_size: f64,

    // --- Rule feature flags --------------------------------------------------

    #[serde(default = "default_true")]
    pub enable_risk_exit: bool,

    #[serde(default = "default_true")]
    pub enable_mean_reversion: bool,

    #[serde(default = "default_true")]
    pub enable_sma_crossover: bool,

    #[serde(default = "default_true")]
    pub enable_rsi_extremes: bool,

    #[serde(default = "default_true")]
    pub enable_bollinger_touch: bool,

    #[serde(default = "default_true")]
    pub enable_macd_crossover: bool,

    #[serde(default = "default_true")]
    pub enable_momentum_breakout: bool,

    // --- Strategy & feed -----------------------------------------------------

    #[serde(default)]
    pub strategy_params: StrategyParams,

    #[serde(default)]
    pub feed: FeedConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            trading_mode: TradingMode::default(),
            symbols: default_symbols(),
            initial_capital: default_initial_capital(),
            tick_interval_secs: default_tick_interval_secs(),
            price_history_len: default_price_history_len(),
            valuation_history_len: default_valuation_history_len(),
            status_trade_limit: default_status_trade_limit(),
            max_open_positions: default_max_open_positions(),
            position_size_pct: default_position_size_pct(),
            min_trade_size: default_min_trade_size(),
            enable_risk_exit: true,
            enable_mean_reversion: true,
            enable_sma_crossover: true,
            enable_rsi_extremes: true,
            enable_bollinger_touch: true,
            enable_macd_crossover: true,
            enable_momentum_breakout: true,
            strategy_params: StrategyParams::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            feed = %config.feed.source,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.symbols.is_empty(), "at least one symbol must be configured");
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            ensure!(seen.insert(symbol.as_str()), "symbol {symbol} is listed more than once");
        }
        ensure!(
            self.initial_capital.is_finite() && self.initial_capital >= 0.0,
            "initial_capital must be a non-negative number, got {}",
            self.initial_capital
        );
        ensure!(self.tick_interval_secs > 0, "tick_interval_secs must be positive");
        ensure!(self.valuation_history_len > 0, "valuation_history_len must be positive");
        ensure!(
            self.position_size_pct > 0.0 && self.position_size_pct <= 100.0,
            "position_size_pct must be in (0, 100], got {}",
            self.position_size_pct
        );
        ensure!(self.min_trade_size >= 0.0, "min_trade_size must not be negative");

        let p = &self.strategy_params;
        let longest_window = [
            p.risk_exit_sma_period,
            p.mean_reversion_period,
            p.crossover_slow_period,
            p.rsi_period + 1,
            p.bollinger_period,
            p.macd_slow + 1,
            p.breakout_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        ensure!(
            p.min_lookback >= longest_window,
            "min_lookback ({}) is shorter than the longest indicator window ({})",
            p.min_lookback,
            longest_window
        );
        ensure!(
            self.price_history_len >= p.min_lookback,
            "price_history_len ({}) cannot hold min_lookback ({}) samples",
            self.price_history_len,
            p.min_lookback
        );
        ensure!(
            p.crossover_fast_period < p.crossover_slow_period,
            "crossover fast period must be shorter than the slow period"
        );
        ensure!(
            p.macd_fast < p.macd_slow,
            "MACD fast period must be shorter than the slow period"
        );
        ensure!(
            p.rsi_oversold < p.rsi_overbought,
            "rsi_oversold must be below rsi_overbought"
        );

        let mut seen = HashSet::new();
        for asset in &self.feed.simulated_assets {
            ensure!(
                seen.insert(asset.symbol.as_str()),
                "simulated asset {} is configured more than once",
                asset.symbol
            );
            ensure!(
                asset.volatility.is_finite() && asset.volatility >= 0.0,
                "volatility for {} must be a non-negative number, got {}",
                asset.symbol,
                asset.volatility
            );
            ensure!(
                asset.drift.is_finite(),
                "drift for {} must be finite, got {}",
                asset.symbol,
                asset.drift
            );
        }

        if self.feed.source == FeedSource::Simulated {
            for symbol in &self.symbols {
                ensure!(
                    self.feed.simulated_assets.iter().any(|a| &a.symbol == symbol),
                    "no simulated asset configured for symbol {symbol}"
                );
            }
        }

        Ok(())
    }
}
