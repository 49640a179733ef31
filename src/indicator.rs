pub mod ma;
pub mod macd;

use std::fmt;

use error_stack::Report;
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::ma::{Ema, Sma};
use crate::indicator::macd::MacdOutput;
use crate::model::Series;

/// A technical indicator computed over a series' close prices.
///
/// Output is aligned 1:1 with the series; `None` marks positions inside the
/// indicator's warm-up window.
pub trait Indicator: Send + Sync {
    /// Column name under which the values are stored (e.g. "SMA20").
    fn column_name(&self) -> String;

    /// Number of leading positions that stay undefined.
    fn warm_up(&self) -> usize;

    fn calculate(&self, series: &Series) -> Vec<Option<f64>>;
}

/// A moving average identified by kind and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MovingAverage {
    Sma(usize),
    Ema(usize),
}

impl MovingAverage {
    pub fn window(self) -> usize {
        match self {
            Self::Sma(w) | Self::Ema(w) => w,
        }
    }

    pub fn column_name(self) -> String {
        self.to_string()
    }

    /// Validate the window and build the matching indicator.
    pub fn build(self) -> Result<Box<dyn Indicator>, Report<IndicatorError>> {
        let indicator: Box<dyn Indicator> = match self {
            Self::Sma(window) => Box::new(Sma::new(window)?),
            Self::Ema(span) => Box::new(Ema::new(span)?),
        };
        Ok(indicator)
    }
}

impl fmt::Display for MovingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sma(w) => write!(f, "SMA{w}"),
            Self::Ema(s) => write!(f, "EMA{s}"),
        }
    }
}

/// Simple moving average of the closes; undefined for the first `window - 1` bars.
pub fn sma(series: &Series, window: usize) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
    Ok(Sma::new(window)?.calculate_prices(&series.closes()))
}

/// Exponential moving average of the closes, seeded with the first close.
pub fn ema(series: &Series, span: usize) -> Result<Vec<f64>, Report<IndicatorError>> {
    Ok(Ema::new(span)?.calculate_prices(&series.closes()))
}

/// MACD(12, 26, 9) of the closes.
pub fn macd(series: &Series) -> MacdOutput {
    macd::calculate(&series.closes())
}
