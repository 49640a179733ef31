use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::model::{Bar, Series};

/// Raw bars as delivered by a data provider, tagged by layout.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// `[timestamp_ms, open, high, low, close, volume]` arrays.
    ///
    /// Volume may be `null` or left off entirely (five-element rows).
    Ohlcv(Vec<Vec<Option<f64>>>),
    /// Named-column rows keyed by a date column.
    Tabular(Vec<TabularRow>),
}

impl RawInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Ohlcv(rows) => rows.len(),
            Self::Tabular(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of a `Date/Open/High/Low/Close[/Volume]` table.
///
/// Every field is optional at parse time so that a missing column surfaces
/// as a `DataShape` error with its row index instead of a parser error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    #[serde(rename = "Date", alias = "date", alias = "Datetime", default)]
    pub date: Option<String>,
    #[serde(rename = "Open", alias = "open", default)]
    pub open: Option<f64>,
    #[serde(rename = "High", alias = "high", default)]
    pub high: Option<f64>,
    #[serde(rename = "Low", alias = "low", default)]
    pub low: Option<f64>,
    #[serde(rename = "Close", alias = "close", default)]
    pub close: Option<f64>,
    #[serde(rename = "Volume", alias = "volume", default)]
    pub volume: Option<f64>,
}

/// Convert raw rows into a canonical [`Series`].
///
/// Rows must already be in ascending timestamp order; they are validated,
/// never re-sorted. An empty input produces an empty series.
pub fn normalize(input: &RawInput) -> Result<Series, Report<NormalizeError>> {
    let bars = match input {
        RawInput::Ohlcv(rows) => rows
            .iter()
            .enumerate()
            .map(|(i, row)| ohlcv_bar(i, row))
            .collect::<Result<Vec<_>, _>>()?,
        RawInput::Tabular(rows) => rows
            .iter()
            .enumerate()
            .map(|(i, row)| tabular_bar(i, row))
            .collect::<Result<Vec<_>, _>>()?,
    };

    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            bail!(NormalizeError::DataShape {
                row: i + 1,
                reason: format!(
                    "timestamp {} is not after previous timestamp {}",
                    pair[1].timestamp, pair[0].timestamp
                ),
            });
        }
    }

    Ok(Series::from_validated(bars))
}

fn ohlcv_bar(row: usize, values: &[Option<f64>]) -> Result<Bar, Report<NormalizeError>> {
    if values.len() != 5 && values.len() != 6 {
        bail!(shape(row, format!("expected 6 fields, got {}", values.len())));
    }

    let field = |idx: usize, name: &str| -> Result<f64, Report<NormalizeError>> {
        values[idx].ok_or_else(|| Report::new(shape(row, format!("missing {name}"))))
    };

    let millis = field(0, "timestamp")?;
    if !millis.is_finite() || millis.fract() != 0.0 {
        bail!(shape(row, format!("timestamp {millis} is not whole milliseconds")));
    }
    let timestamp = DateTime::from_timestamp_millis(millis as i64)
        .ok_or_else(|| Report::new(shape(row, format!("timestamp {millis} out of range"))))?;

    let bar = Bar {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: values.get(5).copied().flatten(),
    };
    validate_bar(row, &bar)?;
    Ok(bar)
}

fn tabular_bar(row: usize, raw: &TabularRow) -> Result<Bar, Report<NormalizeError>> {
    let require = |value: Option<f64>, name: &str| -> Result<f64, Report<NormalizeError>> {
        value.ok_or_else(|| Report::new(shape(row, format!("missing {name}"))))
    };

    let date = raw
        .date
        .as_deref()
        .ok_or_else(|| Report::new(shape(row, "missing Date".into())))?;
    let timestamp =
        parse_date(date).ok_or_else(|| Report::new(shape(row, format!("unparseable Date \"{date}\""))))?;
    if timestamp.timestamp_subsec_nanos() % 1_000_000 != 0 {
        bail!(shape(row, format!("Date \"{date}\" is finer than milliseconds")));
    }

    let bar = Bar {
        timestamp,
        open: require(raw.open, "Open")?,
        high: require(raw.high, "High")?,
        low: require(raw.low, "Low")?,
        close: require(raw.close, "Close")?,
        volume: raw.volume,
    };
    validate_bar(row, &bar)?;
    Ok(bar)
}

/// Parse the date formats stock/forex history exports use.
///
/// Naive timestamps are taken as UTC; a bare date is midnight UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn validate_bar(row: usize, bar: &Bar) -> Result<(), Report<NormalizeError>> {
    for (name, price) in [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ] {
        if !price.is_finite() || price <= 0.0 {
            bail!(shape(row, format!("{name} {price} is not a positive price")));
        }
    }
    if bar.high < bar.low {
        bail!(shape(row, format!("high {} below low {}", bar.high, bar.low)));
    }
    for (name, price) in [("open", bar.open), ("close", bar.close)] {
        if price < bar.low || price > bar.high {
            bail!(shape(
                row,
                format!("{name} {price} outside [{}, {}]", bar.low, bar.high)
            ));
        }
    }
    if let Some(volume) = bar.volume.filter(|v| !v.is_finite() || *v < 0.0) {
        bail!(shape(row, format!("volume {volume} is negative or not finite")));
    }
    Ok(())
}

fn shape(row: usize, reason: String) -> NormalizeError {
    NormalizeError::DataShape { row, reason }
}
