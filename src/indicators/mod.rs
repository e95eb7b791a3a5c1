// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators consulted by the
// strategy arbiter.  Functions that need a minimum amount of history return
// `Option<T>` so callers are forced to handle the insufficient-data case.
//
// Every function reads the *oldest-first* price slice handed to it and never
// mutates anything.  The most recent sample is the last element.

pub mod bollinger;
pub mod ema;
pub mod extrema;
pub mod macd;
pub mod rsi;
pub mod sma;
