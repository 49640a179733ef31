use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::TabularRow;

/// Asset class of a configured instrument.
///
/// Only drives configuration defaults; the indicator engine never branches
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Crypto,
    Equity,
    Forex,
    Commodity,
}

impl AssetClass {
    /// Parse a config-format string into an `AssetClass`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "crypto" => Some(Self::Crypto),
            "equity" => Some(Self::Equity),
            "forex" => Some(Self::Forex),
            "commodity" => Some(Self::Commodity),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Equity => "equity",
            Self::Forex => "forex",
            Self::Commodity => "commodity",
        }
    }

    /// Raw shape a data provider for this class usually hands over.
    pub fn default_shape(self) -> RawShape {
        match self {
            Self::Crypto => RawShape::Ohlcv,
            Self::Equity | Self::Forex | Self::Commodity => RawShape::Tabular,
        }
    }

    /// Fast/slow windows used when an asset does not configure its own.
    ///
    /// Intraday crypto feeds use SMA10/SMA20, daily tabular feeds SMA20/SMA50.
    pub fn default_windows(self) -> (usize, usize) {
        match self {
            Self::Crypto => (10, 20),
            Self::Equity | Self::Forex | Self::Commodity => (20, 50),
        }
    }

    /// Trailing bars shown in a report when neither the asset nor
    /// `[general]` sets `history_rows`.
    pub fn default_history_rows(self) -> usize {
        match self {
            Self::Crypto => 15,
            Self::Equity | Self::Forex | Self::Commodity => 10,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which of the two raw row layouts a source delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawShape {
    Ohlcv,
    Tabular,
}

impl RawShape {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ohlcv" => Some(Self::Ohlcv),
            "tabular" => Some(Self::Tabular),
            _ => None,
        }
    }
}

/// Bar timeframe of a series.
///
/// String representations match the config file format (e.g. `"1m"`, `"1h"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl TimeFrame {
    /// Parse a config-format string into a `TimeFrame`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "1h" => Some(Self::Hour1),
            "4h" => Some(Self::Hour4),
            "1d" => Some(Self::Day1),
            _ => None,
        }
    }

    /// Return the config-format string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One time step of market data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when the source does not report volume.
    pub volume: Option<f64>,
}

/// Timestamp-ordered bars with strictly increasing, unique timestamps.
///
/// Only the normalizer builds a `Series`, so every instance upholds the
/// ordering and price invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub(crate) fn from_validated(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    /// Close prices in series order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Export as `[timestamp_ms, open, high, low, close, volume]` rows.
    pub fn to_ohlcv_rows(&self) -> Vec<Vec<Option<f64>>> {
        self.bars
            .iter()
            .map(|b| {
                vec![
                    Some(b.timestamp.timestamp_millis() as f64),
                    Some(b.open),
                    Some(b.high),
                    Some(b.low),
                    Some(b.close),
                    b.volume,
                ]
            })
            .collect()
    }

    /// Export as named-column rows with RFC 3339 dates.
    pub fn to_tabular_rows(&self) -> Vec<TabularRow> {
        self.bars
            .iter()
            .map(|b| TabularRow {
                date: Some(b.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
                open: Some(b.open),
                high: Some(b.high),
                low: Some(b.low),
                close: Some(b.close),
                volume: b.volume,
            })
            .collect()
    }
}

#[cfg(test)]
impl Series {
    /// Flat one-minute bars whose open/high/low all equal the close.
    pub(crate) fn from_closes(closes: &[f64]) -> Self {
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        Self::from_validated(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    timestamp: start + chrono::Duration::minutes(i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: Some(1.0),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_round_trip() {
        let frames = [
            ("1m", TimeFrame::Min1),
            ("5m", TimeFrame::Min5),
            ("15m", TimeFrame::Min15),
            ("1h", TimeFrame::Hour1),
            ("4h", TimeFrame::Hour4),
            ("1d", TimeFrame::Day1),
        ];
        for (s, tf) in frames {
            assert_eq!(TimeFrame::from_str(s), Some(tf));
            assert_eq!(tf.as_str(), s);
        }
    }

    #[test]
    fn timeframe_invalid_string_returns_none() {
        assert_eq!(TimeFrame::from_str("2m"), None);
        assert_eq!(TimeFrame::from_str(""), None);
    }

    #[test]
    fn asset_class_parse_and_display() {
        for s in ["crypto", "equity", "forex", "commodity"] {
            let class = AssetClass::from_str(s).unwrap();
            assert_eq!(class.to_string(), s);
        }
        assert_eq!(AssetClass::from_str("bond"), None);
    }

    #[test]
    fn asset_class_defaults() {
        assert_eq!(AssetClass::Crypto.default_windows(), (10, 20));
        assert_eq!(AssetClass::Equity.default_windows(), (20, 50));
        assert_eq!(AssetClass::Crypto.default_shape(), RawShape::Ohlcv);
        assert_eq!(AssetClass::Forex.default_shape(), RawShape::Tabular);
        assert_eq!(AssetClass::Crypto.default_history_rows(), 15);
        assert_eq!(AssetClass::Commodity.default_history_rows(), 10);
    }

    #[test]
    fn empty_series_has_no_last_bar() {
        let series = Series::default();
        assert!(series.is_empty());
        assert!(series.last().is_none());
        assert!(series.closes().is_empty());
    }

    #[test]
    fn asset_class_serde_round_trip() {
        let json = serde_json::to_string(&AssetClass::Commodity).unwrap();
        assert_eq!(json, "\"commodity\"");
        let parsed: AssetClass = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, AssetClass::Commodity);
    }
}
