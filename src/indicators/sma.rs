// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

/// Arithmetic mean of the last `period` values.
///
/// Returns `None` when `period == 0` or fewer than `period` values exist.
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

/// Relative deviation of `price` from the `period`-sample SMA, as a fraction
/// (0.01 == 1 %).
///
/// Returns `None` when the SMA is unavailable or zero.
pub fn deviation_from_sma(values: &[f64], period: usize, price: f64) -> Option<f64> {
    let sma = calculate_sma(values, period)?;
    if sma == 0.0 {
        return None;
    }
    Some((price - sma) / sma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_only_trailing_window() {
        let values = vec![100.0, 1.0, 2.0, 3.0];
        let sma = calculate_sma(&values, 3).unwrap();
        assert!((sma - 2.0).abs() < 1e-10);
    }

    #[test]
    fn sma_insufficient_data() {
        assert!(calculate_sma(&[1.0, 2.0], 3).is_none());
        assert!(calculate_sma(&[1.0, 2.0], 0).is_none());
    }

    #[test]
    fn deviation_sign_follows_price() {
        let values = vec![100.0; 10];
        let above = deviation_from_sma(&values, 10, 102.0).unwrap();
        let below = deviation_from_sma(&values, 10, 99.0).unwrap();
        assert!((above - 0.02).abs() < 1e-12);
        assert!((below + 0.01).abs() < 1e-12);
    }

    #[test]
    fn deviation_zero_mean_is_none() {
        assert!(deviation_from_sma(&[0.0; 5], 5, 1.0).is_none());
    }
}
