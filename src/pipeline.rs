use error_stack::{Report, ResultExt};
use tracing::debug;

use crate::error::{AnalysisError, IndicatorError};
use crate::frame::IndicatorFrame;
use crate::indicator::MovingAverage;
use crate::normalize::{RawInput, normalize};
use crate::signal::{CrossoverRule, SignalAction};

/// What to compute for one asset.
#[derive(Debug, Clone)]
pub struct AnalysisSpec {
    pub crossover: CrossoverRule,
    pub macd: bool,
    /// Additional averages to chart alongside the crossover pair.
    pub extra: Vec<MovingAverage>,
}

impl AnalysisSpec {
    pub fn new(crossover: CrossoverRule) -> Self {
        Self {
            crossover,
            macd: true,
            extra: Vec::new(),
        }
    }
}

/// Indicator frame and the signal read from its last row.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub frame: IndicatorFrame,
    pub signal: SignalAction,
}

/// Normalize `raw`, add the requested indicators and evaluate the crossover.
///
/// Normalizer and indicator failures keep their original context at the
/// root of the returned report.
pub fn analyze(raw: &RawInput, spec: &AnalysisSpec) -> Result<Analysis, Report<AnalysisError>> {
    let series = normalize(raw).change_context(AnalysisError::Normalize)?;
    debug!(bars = series.len(), "series normalized");

    let frame = build_frame(IndicatorFrame::new(series), spec)
        .change_context(AnalysisError::Indicator)?;
    let signal = spec.crossover.evaluate(&frame);

    debug!(
        fast = %spec.crossover.fast,
        slow = %spec.crossover.slow,
        fast_value = frame.last_value(&spec.crossover.fast.column_name()),
        slow_value = frame.last_value(&spec.crossover.slow.column_name()),
        %signal,
        "crossover evaluated"
    );

    Ok(Analysis { frame, signal })
}

fn build_frame(
    frame: IndicatorFrame,
    spec: &AnalysisSpec,
) -> Result<IndicatorFrame, Report<IndicatorError>> {
    let mut frame = spec.crossover.prepare(frame)?;
    for &average in &spec.extra {
        frame = frame.with_moving_average(average)?;
    }
    if spec.macd {
        frame = frame.with_macd()?;
    }
    Ok(frame)
}
