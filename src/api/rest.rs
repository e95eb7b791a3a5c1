// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Versioned endpoints live under `/api/v1/`.  `/status` and `/history` are
// also mounted at the root, where the dashboard polls them.
//
// CORS is configured permissively; the API is read-only apart from the
// pause / resume controls.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::{AppState, ErrorRecord};
use crate::ledger::Status;
use crate::market_data::PriceFeed;
use crate::types::TradingMode;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Dashboard ───────────────────────────────────────────────
        .route("/status", get(status))
        .route("/history", get(history))
        // ── v1 ──────────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/status", get(status))
        .route("/api/v1/history", get(history))
        .route("/api/v1/decisions", get(decisions))
        .route("/api/v1/control/pause", post(control_pause))
        .route("/api/v1/control/resume", post(control_resume))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    trading_mode: TradingMode,
    feed: String,
    tick_count: u64,
    state_version: u64,
    uptime_secs: u64,
    server_time: i64,
    recent_errors: Vec<ErrorRecord>,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        trading_mode: state.trading_mode(),
        feed: state.feed.source().to_string(),
        tick_count: state.engine.tick_count(),
        state_version: state.current_state_version(),
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
        recent_errors: state.recent_errors(),
    };
    Json(resp)
}

// =============================================================================
// Portfolio
// =============================================================================

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: Status,
    market_prices: BTreeMap<String, f64>,
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let prices = state.feed.current_prices();
    let status = state.engine.status_at(&prices);
    Json(StatusResponse {
        status,
        market_prices: prices.into_iter().collect(),
    })
}

async fn history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.history())
}

async fn decisions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_decisions())
}

// =============================================================================
// Control
// =============================================================================

#[derive(Serialize)]
struct ControlResponse {
    trading_mode: TradingMode,
    message: &'static str,
}

async fn control_pause(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let previous = state.set_trading_mode(TradingMode::Paused);
    info!(%previous, "Trading PAUSED via API");

    Json(ControlResponse {
        trading_mode: TradingMode::Paused,
        message: "Trading paused",
    })
}

async fn control_resume(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let previous = state.set_trading_mode(TradingMode::Live);
    info!(%previous, "Trading RESUMED via API");

    Json(ControlResponse {
        trading_mode: TradingMode::Live,
        message: "Trading resumed",
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use crate::runtime_config::RuntimeConfig;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(RuntimeConfig::default()).unwrap())
    }

    async fn call(
        app: Router,
        method: Method,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn status_matches_dashboard_contract() {
        let state = app_state();
        for uri in ["/status", "/api/v1/status"] {
            let (code, json) = call(router(state.clone()), Method::GET, uri).await;
            assert_eq!(code, StatusCode::OK);
            for key in [
                "capital",
                "portfolio",
                "total_value",
                "trade_history",
                "capital_history",
                "market_prices",
            ] {
                assert!(json.get(key).is_some(), "{uri} missing {key}");
            }
            assert_eq!(json["capital"], 100_000.0);
            assert_eq!(json["market_prices"]["BTC"], 45_000.0);
            assert_eq!(json["portfolio"]["ETH"], 0.0);
        }
    }

    #[tokio::test]
    async fn history_has_capital_and_trades() {
        let (code, json) = call(router(app_state()), Method::GET, "/history").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(json["capital"].as_array().unwrap().len(), 1);
        assert_eq!(json["capital"][0]["value"], 100_000.0);
        assert!(json["trades"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn decisions_reflect_recorded_ticks() {
        let state = app_state();
        let report = state.engine.run_tick(state.feed.as_ref());
        state.record_tick(&report);

        let (_, json) = call(router(state), Method::GET, "/api/v1/decisions").await;
        let decisions = json.as_array().unwrap();
        assert_eq!(decisions.len(), 4);
        assert_eq!(decisions[0]["symbol"], "AAPL");
        assert_eq!(decisions[0]["outcome"], "INSUFFICIENT_HISTORY");
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_trading_mode() {
        let state = app_state();

        let (code, json) = call(router(state.clone()), Method::POST, "/api/v1/control/pause").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(json["trading_mode"], "Paused");
        assert_eq!(state.trading_mode(), TradingMode::Paused);

        let (_, health) = call(router(state.clone()), Method::GET, "/api/v1/health").await;
        assert_eq!(health["trading_mode"], "Paused");
        assert_eq!(health["feed"], "Simulated");

        call(router(state.clone()), Method::POST, "/api/v1/control/resume").await;
        assert_eq!(state.trading_mode(), TradingMode::Live);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let req = Request::builder()
            .uri("/api/v1/nope")
            .body(Body::empty())
            .unwrap();
        let resp = router(app_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
