// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unauthenticated endpoints are used: the spot ticker for live prices
// and klines for warming up price history.  No keys are held.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

/// Request timeout for every call.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Index of the close price inside a kline array.
const KLINE_CLOSE_IDX: usize = 4;

#[derive(Debug, Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    /// Create a client against `base_url` (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build reqwest client")?;

        debug!(%base_url, "BinanceClient initialised");

        Ok(Self { base_url, client })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a public endpoint and return the JSON body, failing on non-2xx.
    async fn get_json(&self, path: &str, query: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}?{}", self.base_url, path, query);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        if !status.is_success() {
            anyhow::bail!("Binance GET {} returned {}: {}", path, status, body);
        }

        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/ticker/price — latest traded price of `pair`.
    #[instrument(skip(self), name = "binance::get_ticker_price")]
    pub async fn get_ticker_price(&self, pair: &str) -> Result<f64> {
        let body = self
            .get_json("/api/v3/ticker/price", &format!("symbol={pair}"))
            .await?;
        let price = parse_ticker_price(&body)?;
        debug!(pair, price, "ticker price fetched");
        Ok(price)
    }

    /// GET /api/v3/klines — close prices of the last `limit` candles,
    /// oldest first.
    #[instrument(skip(self), name = "binance::get_kline_closes")]
    pub async fn get_kline_closes(&self, pair: &str, interval: &str, limit: u32) -> Result<Vec<f64>> {
        let body = self
            .get_json(
                "/api/v3/klines",
                &format!("symbol={pair}&interval={interval}&limit={limit}"),
            )
            .await?;
        let closes = parse_kline_closes(&body)?;
        debug!(pair, interval, count = closes.len(), "klines fetched");
        Ok(closes)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// `{"symbol":"BTCUSDT","price":"45000.10"}`
fn parse_ticker_price(body: &serde_json::Value) -> Result<f64> {
    parse_str_f64(&body["price"]).context("ticker response missing 'price'")
}

/// Array-of-arrays kline response; index 4 is the close.
fn parse_kline_closes(body: &serde_json::Value) -> Result<Vec<f64>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut closes = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() <= KLINE_CLOSE_IDX {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }
        closes.push(parse_str_f64(&arr[KLINE_CLOSE_IDX])?);
    }
    Ok(closes)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}
