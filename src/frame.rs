use std::collections::BTreeMap;

use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::macd::{self, HISTOGRAM_COLUMN, MACD_COLUMN, SIGNAL_COLUMN};
use crate::indicator::{Indicator, MovingAverage};
use crate::model::Series;

/// A series plus named indicator columns aligned with its bars.
///
/// Source bars are never touched; indicators only add columns. Re-adding a
/// column under the same name replaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorFrame {
    series: Series,
    columns: BTreeMap<String, Vec<Option<f64>>>,
    #[serde(skip)]
    warm_ups: BTreeMap<String, usize>,
}

impl IndicatorFrame {
    pub fn new(series: Series) -> Self {
        Self {
            series,
            columns: BTreeMap::new(),
            warm_ups: BTreeMap::new(),
        }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Value of `name` at the last bar, if the column exists and is defined there.
    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.columns.get(name)?.last().copied().flatten()
    }

    /// Value of `name` at `index`, if defined.
    pub fn value_at(&self, name: &str, index: usize) -> Option<f64> {
        self.columns.get(name)?.get(index).copied().flatten()
    }

    /// Leading bars for which the indicator behind `name` stays undefined.
    ///
    /// Only known for columns added through an [`Indicator`] or MACD.
    pub fn warm_up(&self, name: &str) -> Option<usize> {
        self.warm_ups.get(name).copied()
    }

    /// Store a column, rejecting it unless it has one value per bar.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), Report<IndicatorError>> {
        let name = name.into();
        if values.len() != self.series.len() {
            bail!(IndicatorError::Misaligned {
                name,
                expected: self.series.len(),
                actual: values.len(),
            });
        }
        self.warm_ups.remove(&name);
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn with_indicator(
        mut self,
        indicator: &dyn Indicator,
    ) -> Result<Self, Report<IndicatorError>> {
        let name = indicator.column_name();
        let values = indicator.calculate(&self.series);
        self.insert(name.clone(), values)?;
        self.warm_ups.insert(name, indicator.warm_up());
        Ok(self)
    }

    pub fn with_moving_average(
        self,
        average: MovingAverage,
    ) -> Result<Self, Report<IndicatorError>> {
        let indicator = average.build()?;
        self.with_indicator(indicator.as_ref())
    }

    pub fn with_sma(self, window: usize) -> Result<Self, Report<IndicatorError>> {
        self.with_moving_average(MovingAverage::Sma(window))
    }

    pub fn with_ema(self, span: usize) -> Result<Self, Report<IndicatorError>> {
        self.with_moving_average(MovingAverage::Ema(span))
    }

    /// Add the `MACD`, `Signal` and `Histogram` columns.
    pub fn with_macd(mut self) -> Result<Self, Report<IndicatorError>> {
        let out = macd::calculate(&self.series.closes());
        let defined = |v: Vec<f64>| v.into_iter().map(Some).collect::<Vec<_>>();
        self.insert(MACD_COLUMN, defined(out.macd_line))?;
        self.insert(SIGNAL_COLUMN, defined(out.signal_line))?;
        self.insert(HISTOGRAM_COLUMN, defined(out.histogram))?;
        for name in [MACD_COLUMN, SIGNAL_COLUMN, HISTOGRAM_COLUMN] {
            self.warm_ups.insert(name.to_string(), 0);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_with_series() {
        let series = Series::from_closes(&(1..=30).map(|i| i as f64).collect::<Vec<_>>());
        let frame = IndicatorFrame::new(series)
            .with_sma(20)
            .unwrap()
            .with_ema(12)
            .unwrap()
            .with_macd()
            .unwrap();

        let names: Vec<_> = frame.column_names().collect();
        assert_eq!(names, ["EMA12", "Histogram", "MACD", "SMA20", "Signal"]);
        for name in names {
            assert_eq!(frame.column(name).unwrap().len(), 30);
        }
        assert_eq!(frame.value_at("SMA20", 18), None);
        assert_eq!(frame.value_at("SMA20", 19), Some(10.5));
        assert_eq!(frame.last_value("SMA20"), Some(20.5));
    }

    #[test]
    fn misaligned_column_rejected() {
        let mut frame = IndicatorFrame::new(Series::from_closes(&[1.0, 2.0, 3.0]));
        let err = frame.insert("bogus", vec![Some(1.0)]).unwrap_err();
        assert_eq!(
            *err.current_context(),
            IndicatorError::Misaligned {
                name: "bogus".into(),
                expected: 3,
                actual: 1,
            }
        );
        assert!(frame.column("bogus").is_none());
    }

    #[test]
    fn indicators_do_not_touch_bars() {
        let series = Series::from_closes(&[5.0, 6.0, 7.0, 8.0]);
        let frame = IndicatorFrame::new(series.clone())
            .with_sma(2)
            .unwrap()
            .with_macd()
            .unwrap();
        assert_eq!(frame.series(), &series);
    }

    #[test]
    fn invalid_window_propagates() {
        let frame = IndicatorFrame::new(Series::from_closes(&[1.0]));
        assert!(frame.with_sma(0).is_err());
    }

    #[test]
    fn empty_frame_has_no_values() {
        let frame = IndicatorFrame::new(Series::default())
            .with_sma(10)
            .unwrap()
            .with_macd()
            .unwrap();
        assert_eq!(frame.len(), 0);
        assert_eq!(frame.last_value("SMA10"), None);
        assert_eq!(frame.last_value("MACD"), None);
    }

    #[test]
    fn missing_column_has_no_value() {
        let frame = IndicatorFrame::new(Series::from_closes(&[1.0, 2.0]));
        assert_eq!(frame.last_value("SMA10"), None);
        assert_eq!(frame.value_at("SMA10", 0), None);
    }

    #[test]
    fn warm_up_recorded_per_indicator_column() {
        let mut frame = IndicatorFrame::new(Series::from_closes(&[1.0, 2.0, 3.0]))
            .with_sma(20)
            .unwrap()
            .with_ema(5)
            .unwrap()
            .with_macd()
            .unwrap();
        assert_eq!(frame.warm_up("SMA20"), Some(19));
        assert_eq!(frame.warm_up("EMA5"), Some(0));
        assert_eq!(frame.warm_up("Histogram"), Some(0));

        frame.insert("SMA20", vec![None, None, Some(2.0)]).unwrap();
        assert_eq!(frame.warm_up("SMA20"), None);
    }
}
