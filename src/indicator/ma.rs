use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::Series;

/// Simple Moving Average.
pub struct Sma {
    window: usize,
}

impl Sma {
    pub fn new(window: usize) -> Result<Self, Report<IndicatorError>> {
        if window == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "window must be > 0".into(),
            });
        }
        Ok(Self { window })
    }

    /// Calculate SMA values aligned with `prices`.
    ///
    /// The first `window - 1` positions are `None`; a slice shorter than the
    /// window yields only `None`.
    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let mut values = vec![None; prices.len().min(self.window - 1)];
        values.extend(
            prices
                .windows(self.window)
                .map(|w| Some(w.iter().sum::<f64>() / self.window as f64)),
        );
        values
    }
}

impl Indicator for Sma {
    fn column_name(&self) -> String {
        format!("SMA{}", self.window)
    }

    fn warm_up(&self) -> usize {
        self.window - 1
    }

    fn calculate(&self, series: &Series) -> Vec<Option<f64>> {
        self.calculate_prices(&series.closes())
    }
}

/// Exponential Moving Average.
pub struct Ema {
    span: usize,
}

impl Ema {
    pub fn new(span: usize) -> Result<Self, Report<IndicatorError>> {
        if span == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "span must be > 0".into(),
            });
        }
        Ok(Self { span })
    }

    /// Calculate EMA values aligned with `prices`, defined from index 0.
    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<f64> {
        ema_values(prices, self.span)
    }
}

impl Indicator for Ema {
    fn column_name(&self) -> String {
        format!("EMA{}", self.span)
    }

    fn warm_up(&self) -> usize {
        0
    }

    fn calculate(&self, series: &Series) -> Vec<Option<f64>> {
        self.calculate_prices(&series.closes())
            .into_iter()
            .map(Some)
            .collect()
    }
}

/// EMA recurrence with `alpha = 2 / (span + 1)`, seeded with `prices[0]`.
///
/// `span` must be non-zero; callers outside this module go through `Ema::new`.
pub(super) fn ema_values(prices: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let Some((&first, rest)) = prices.split_first() else {
        return Vec::new();
    };

    let mut values = Vec::with_capacity(prices.len());
    values.push(first);
    let mut ema = first;
    for &price in rest {
        ema = alpha * price + (1.0 - alpha) * ema;
        values.push(ema);
    }
    values
}
