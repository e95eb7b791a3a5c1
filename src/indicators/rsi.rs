// =============================================================================
// Relative Strength Index (RSI) — simple-average variant
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an instrument is overbought or oversold.
//
// Step 1 — Take the last `period` deltas between consecutive prices.
// Step 2 — avg_gain = Σ max(delta, 0) / period
//          avg_loss = Σ max(-delta, 0) / period
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Unlike Wilder's smoothing this looks only at the trailing window, so the
// value depends on exactly `period + 1` samples.
// =============================================================================

/// Value returned when there is not enough history, or no movement at all.
pub const NEUTRAL_RSI: f64 = 50.0;

/// RSI over the trailing `period` transitions of `values`.
///
/// # Edge cases
/// - `period == 0` or fewer than `period + 1` values => [`NEUTRAL_RSI`]
/// - no gains and no losses (flat window) => [`NEUTRAL_RSI`]
/// - gains but no losses => 100.0
pub fn calculate_rsi(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period + 1 {
        return NEUTRAL_RSI;
    }

    let window = &values[values.len() - (period + 1)..];
    let (sum_gain, sum_loss) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0_f64, 0.0_f64), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let period_f = period as f64;
    rsi_from_averages(sum_gain / period_f, sum_loss / period_f)
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        NEUTRAL_RSI
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    if rsi.is_finite() {
        rsi
    } else {
        NEUTRAL_RSI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_short_history_is_neutral() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!((calculate_rsi(&closes, 14) - 50.0).abs() < 1e-10);
        assert!((calculate_rsi(&[], 14) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_period_zero_is_neutral() {
        assert!((calculate_rsi(&[1.0, 2.0, 3.0], 0) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_strictly_increasing_is_100() {
        let closes: Vec<f64> = (1..=15).map(|x| x as f64).collect();
        assert!((calculate_rsi(&closes, 14) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_strictly_decreasing_is_0() {
        let closes: Vec<f64> = (1..=15).rev().map(|x| x as f64).collect();
        assert!(calculate_rsi(&closes, 14).abs() < 1e-10);
    }

    #[test]
    fn rsi_flat_market() {
        let closes = vec![100.0; 30];
        assert!((calculate_rsi(&closes, 14) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_only_reads_trailing_window() {
        // A huge early drop must not affect the value once it leaves the window.
        let mut closes = vec![1000.0, 1.0];
        closes.extend((2..=16).map(|x| x as f64));
        assert!((calculate_rsi(&closes, 14) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_balanced_moves() {
        // Alternating +1 / -1 over an even window => equal averages => 50.
        let closes: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        assert!((calculate_rsi(&closes, 14) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let rsi = calculate_rsi(&closes, 14);
        assert!((0.0..=100.0).contains(&rsi), "RSI {rsi} out of range");
    }
}
