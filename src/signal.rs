use std::fmt;

use error_stack::Report;
use serde::Serialize;

use crate::error::IndicatorError;
use crate::frame::IndicatorFrame;
use crate::indicator::MovingAverage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Compare two columns at the last bar of `frame`.
///
/// `fast > slow` is a buy, `fast < slow` a sell. Exact equality, an
/// undefined value, a missing column or an empty frame all yield `Hold`.
pub fn evaluate(frame: &IndicatorFrame, fast_column: &str, slow_column: &str) -> SignalAction {
    let Some(fast) = frame.last_value(fast_column) else {
        return SignalAction::Hold;
    };
    let Some(slow) = frame.last_value(slow_column) else {
        return SignalAction::Hold;
    };

    if fast > slow {
        return SignalAction::Buy;
    }
    if fast < slow {
        return SignalAction::Sell;
    }
    SignalAction::Hold
}

/// The fast/slow moving-average pair a caller designates for crossovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrossoverRule {
    pub fast: MovingAverage,
    pub slow: MovingAverage,
}

impl CrossoverRule {
    pub fn new(fast: MovingAverage, slow: MovingAverage) -> Result<Self, Report<IndicatorError>> {
        for average in [fast, slow] {
            if average.window() == 0 {
                return Err(Report::new(IndicatorError::InvalidParameter {
                    name: format!("{average}: window must be > 0"),
                }));
            }
        }
        Ok(Self { fast, slow })
    }

    pub fn sma(fast: usize, slow: usize) -> Result<Self, Report<IndicatorError>> {
        Self::new(MovingAverage::Sma(fast), MovingAverage::Sma(slow))
    }

    /// Add both moving-average columns to `frame`.
    pub fn prepare(&self, frame: IndicatorFrame) -> Result<IndicatorFrame, Report<IndicatorError>> {
        frame
            .with_moving_average(self.fast)?
            .with_moving_average(self.slow)
    }

    pub fn evaluate(&self, frame: &IndicatorFrame) -> SignalAction {
        evaluate(
            frame,
            &self.fast.column_name(),
            &self.slow.column_name(),
        )
    }
}
