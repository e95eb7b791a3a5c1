// =============================================================================
// Rolling Extrema
// =============================================================================
//
// Highest / lowest value over a trailing window.  Two window conventions are
// in use and callers must name one explicitly:
//
//   IncludingCurrent  — the last `period` samples, current sample included.
//   PrecedingCurrent  — the `period` samples strictly before the current one.
//
// Breakout logic needs `PrecedingCurrent`: a window that contains the current
// price can never be "cleared" by it.

/// Which samples form the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowConvention {
    IncludingCurrent,
    PrecedingCurrent,
}

/// Highest and lowest value of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub high: f64,
    pub low: f64,
}

/// Extrema over the trailing `period` samples under `convention`.
///
/// Returns `None` when `period == 0` or the window does not fit in `values`.
pub fn trailing_extrema(
    values: &[f64],
    period: usize,
    convention: WindowConvention,
) -> Option<Extrema> {
    if period == 0 {
        return None;
    }

    let end = match convention {
        WindowConvention::IncludingCurrent => values.len(),
        WindowConvention::PrecedingCurrent => values.len().checked_sub(1)?,
    };
    let start = end.checked_sub(period)?;
    let window = &values[start..end];

    let (high, low) = window
        .iter()
        .fold((f64::NEG_INFINITY, f64::INFINITY), |(hi, lo), &v| {
            (hi.max(v), lo.min(v))
        });

    Some(Extrema { high, low })
}
