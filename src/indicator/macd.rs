use serde::Serialize;

use crate::indicator::ma::ema_values;

pub const FAST_SPAN: usize = 12;
pub const SLOW_SPAN: usize = 26;
pub const SIGNAL_SPAN: usize = 9;

pub const MACD_COLUMN: &str = "MACD";
pub const SIGNAL_COLUMN: &str = "Signal";
pub const HISTOGRAM_COLUMN: &str = "Histogram";

/// MACD line, its signal line and their difference, aligned with the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdOutput {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD(12, 26, 9).
///
/// Every position is defined because the underlying EMAs are seeded with the
/// first price rather than an SMA warm-up.
pub fn calculate(prices: &[f64]) -> MacdOutput {
    let fast = ema_values(prices, FAST_SPAN);
    let slow = ema_values(prices, SLOW_SPAN);

    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    // Smoothed over the MACD line itself, not over price.
    let signal_line = ema_values(&macd_line, SIGNAL_SPAN);
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    MacdOutput {
        macd_line,
        signal_line,
        histogram,
    }
}
