// =============================================================================
// Moving Average Convergence / Divergence (MACD)
// =============================================================================
//
//   MACD_t   = EMA_fast_t - EMA_slow_t
//   signal_t = EMA_signal(MACD)_t
//
// The signal line is a genuine EMA over the MACD series, computed sample by
// sample across the whole window.  Crossovers are detected by comparing the
// current (MACD, signal) pair with the pair one sample earlier, so the result
// carries both.
// =============================================================================

use super::ema::ema_series;

/// Latest MACD reading plus the previous sample's values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub prev_macd: f64,
    pub prev_signal: f64,
}

impl MacdResult {
    /// MACD moved from at-or-below the signal line to above it.
    pub fn crossed_above(&self) -> bool {
        self.prev_macd <= self.prev_signal && self.macd > self.signal
    }

    /// MACD moved from at-or-above the signal line to below it.
    pub fn crossed_below(&self) -> bool {
        self.prev_macd >= self.prev_signal && self.macd < self.signal
    }
}

/// Compute MACD with the given EMA periods (conventionally 12 / 26 / 9).
///
/// Returns `None` when:
/// - any period is zero or `fast >= slow`
/// - fewer than `slow + 1` values exist
/// - any of the EMA series was truncated by a non-finite value
pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<MacdResult> {
    if fast == 0 || signal == 0 || fast >= slow || values.len() < slow + 1 {
        return None;
    }

    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);
    if fast_ema.len() != values.len() || slow_ema.len() != values.len() {
        return None;
    }

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&macd_line, signal);
    if signal_line.len() != macd_line.len() {
        return None;
    }

    let n = macd_line.len();
    let macd = macd_line[n - 1];
    let signal = signal_line[n - 1];

    Some(MacdResult {
        macd,
        signal,
        histogram: macd - signal,
        prev_macd: macd_line[n - 2],
        prev_signal: signal_line[n - 2],
    })
}
