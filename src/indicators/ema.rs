// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = (value_t - EMA_{t-1}) * multiplier + EMA_{t-1}
//
// The fold is seeded with the first value of the evaluated window, so an EMA
// exists for any non-empty input.  Early values lean heavily on the seed;
// consumers that care should feed a long enough window.
// =============================================================================

/// Running EMA value at every position of `values`.
///
/// The output has the same length as the input (element 0 is the seed).
/// Returns an empty `Vec` for empty input or `period == 0`.  Production of
/// values stops at the first non-finite intermediate.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let Some((&seed, rest)) = values.split_first() else {
        return Vec::new();
    };
    if period == 0 || !seed.is_finite() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let mut result = Vec::with_capacity(values.len());
    result.push(seed);

    let mut prev = seed;
    for &value in rest {
        let ema = (value - prev) * multiplier + prev;
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev = ema;
    }

    result
}

/// Final EMA value over the whole of `values`.
pub fn calculate_ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}
