// =============================================================================
// Central Application State — Arbitra Trading Engine
// =============================================================================
//
// Ties the trading engine, the market feed and the runtime config together
// for the tick loop and the REST API.  Built once in `main` and shared as
// `Arc<AppState>`.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - Arc wrappers for subsystems that manage their own interior mutability.
//   - No guard is ever held across an `.await`.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::decision_envelope::DecisionEnvelope;
use crate::engine::{TickReport, TradingEngine};
use crate::market_data::feed::FeedFailure;
use crate::market_data::MarketFeed;
use crate::runtime_config::RuntimeConfig;
use crate::types::TradingMode;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded feed failure for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub symbol: String,
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;
/// Maximum number of recent decisions to retain.
const MAX_RECENT_DECISIONS: usize = 100;

pub struct AppState {
    /// Incremented after every tick and every control action.
    pub state_version: AtomicU64,

    pub runtime_config: RwLock<RuntimeConfig>,

    pub engine: Arc<TradingEngine>,
    pub feed: Arc<MarketFeed>,

    // ── Audit ───────────────────────────────────────────────────────────
    pub recent_decisions: RwLock<VecDeque<DecisionEnvelope>>,
    pub recent_errors: RwLock<VecDeque<ErrorRecord>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the engine and feed described by `config`.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let feed = MarketFeed::from_config(&config)?;
        let engine = TradingEngine::from_config(&config);
        Ok(Self::with_parts(config, engine, feed))
    }

    pub fn with_parts(config: RuntimeConfig, engine: TradingEngine, feed: MarketFeed) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: RwLock::new(config),
            engine: Arc::new(engine),
            feed: Arc::new(feed),
            recent_decisions: RwLock::new(VecDeque::with_capacity(MAX_RECENT_DECISIONS)),
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn trading_mode(&self) -> TradingMode {
        self.runtime_config.read().trading_mode
    }

    /// Switch trading mode.  Returns the previous mode.
    pub fn set_trading_mode(&self, mode: TradingMode) -> TradingMode {
        let previous = std::mem::replace(&mut self.runtime_config.write().trading_mode, mode);
        if previous != mode {
            self.increment_version();
        }
        previous
    }

    // ── Audit rings ─────────────────────────────────────────────────────

    /// Record the envelopes of one tick.  Oldest entries are evicted past
    /// [`MAX_RECENT_DECISIONS`].
    pub fn record_tick(&self, report: &TickReport) {
        let mut decisions = self.recent_decisions.write();
        decisions.extend(report.decisions.iter().cloned());
        while decisions.len() > MAX_RECENT_DECISIONS {
            decisions.pop_front();
        }
        drop(decisions);

        self.increment_version();
    }

    /// Record feed failures.  Oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn record_feed_failures(&self, failures: &[FeedFailure]) {
        if failures.is_empty() {
            return;
        }
        let at = Utc::now().to_rfc3339();
        let mut errors = self.recent_errors.write();
        errors.extend(failures.iter().map(|f| ErrorRecord {
            symbol: f.symbol.clone(),
            message: f.error.clone(),
            at: at.clone(),
        }));
        while errors.len() > MAX_RECENT_ERRORS {
            errors.pop_front();
        }
    }

    /// Most recent decisions, newest last.
    pub fn recent_decisions(&self) -> Vec<DecisionEnvelope> {
        self.recent_decisions.read().iter().cloned().collect()
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().iter().cloned().collect()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
