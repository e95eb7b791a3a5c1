// =============================================================================
// Arbitra Bot — Main Entry Point
// =============================================================================
//
// Simulated trading agent: every tick the market feed is refreshed, each
// instrument is run through the strategy rules, and the resulting trades are
// applied to a virtual portfolio.  Nothing is ever sent to an exchange.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod decision_envelope;
mod engine;
mod indicators;
mod ledger;
mod market_data;
mod position_engine;
mod runtime_config;
mod strategy;
mod types;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::{FeedSource, RuntimeConfig};
use crate::types::TradingMode;

const DEFAULT_CONFIG_PATH: &str = "runtime_config.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Arbitra Bot — Starting Up                        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("ARBITRA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("ARBITRA_SYMBOLS") {
        let mut seen = HashSet::new();
        let syms: Vec<String> = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if !syms.is_empty() {
            config.symbols = syms;
        }
    }

    config.validate().context("invalid runtime config")?;

    info!(
        symbols = ?config.symbols,
        trading_mode = %config.trading_mode,
        feed = %config.feed.source,
        tick_interval_secs = config.tick_interval_secs,
        initial_capital = config.initial_capital,
        "Configuration ready"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let tick_interval = std::time::Duration::from_secs(config.tick_interval_secs);
    let warm_up = config.feed.source == FeedSource::Binance && config.feed.warm_up;
    let state = Arc::new(AppState::new(config).context("failed to build application state")?);

    // ── 3. Warm up price history ─────────────────────────────────────────
    if warm_up {
        let report = state.feed.warm_up().await;
        state.record_feed_failures(&report.failed);
    }

    // ── 4. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("ARBITRA_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Tick loop ─────────────────────────────────────────────────────
    let tick_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let refresh = tick_state.feed.refresh().await;
            tick_state.record_feed_failures(&refresh.failed);

            if tick_state.trading_mode() == TradingMode::Paused {
                tick_state.increment_version();
                continue;
            }

            let report = tick_state.engine.run_tick(tick_state.feed.as_ref());
            tick_state.record_tick(&report);
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(&config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    let final_status = state.engine.status(state.feed.as_ref());
    info!(
        ticks = state.engine.tick_count(),
        trades = state.engine.history().trades.len(),
        capital = final_status.capital,
        total_value = final_status.total_value,
        "Arbitra Bot shut down complete."
    );
    Ok(())
}
