// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the *population* standard
// deviation over the same window as the SMA.  The Band Width (BBW) is the
// normalised distance: BBW = (upper - lower) / middle * 100.

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Calculate Bollinger Bands over the trailing `period` values.
///
/// Returns `None` when:
/// - Fewer than `period` data points (or `period == 0`).
/// - Middle band is zero (degenerate input).
/// - The band width is non-finite.
pub fn calculate_bollinger(values: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let spread = num_std * variance.sqrt();

    let upper = middle + spread;
    let lower = middle - spread;
    let width = (upper - lower) / middle * 100.0;

    width.is_finite().then_some(BollingerBands {
        upper,
        middle,
        lower,
        width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_known_values() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population σ 2.
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bb = calculate_bollinger(&values, 8, 2.0).unwrap();
        assert!((bb.middle - 5.0).abs() < 1e-10);
        assert!((bb.upper - 9.0).abs() < 1e-10);
        assert!((bb.lower - 1.0).abs() < 1e-10);
        assert!((bb.width - 160.0).abs() < 1e-10);
    }

    #[test]
    fn bollinger_uses_trailing_window() {
        let mut values = vec![1000.0; 5];
        values.extend(std::iter::repeat(10.0).take(20));
        let bb = calculate_bollinger(&values, 20, 2.0).unwrap();
        assert!((bb.middle - 10.0).abs() < 1e-10);
    }

    #[test]
    fn bollinger_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
        assert!(calculate_bollinger(&[1.0, 2.0, 3.0], 0, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat() {
        let bb = calculate_bollinger(&[100.0; 20], 20, 2.0).unwrap();
        assert!(bb.width.abs() < 1e-10);
        assert!((bb.upper - bb.lower).abs() < 1e-10);
    }
}
