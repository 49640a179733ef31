use std::fmt;
use std::io::Read;
use std::path::Path;

use error_stack::{Report, ResultExt};

use crate::error::SourceError;
use crate::model::RawShape;
use crate::normalize::{RawInput, TabularRow};

/// On-disk layout of a raw bar dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// JSON array of `[timestamp_ms, open, high, low, close, volume]` arrays.
    OhlcvJson,
    /// JSON array of `{"Date": .., "Open": .., ..}` records.
    TabularJson,
    /// CSV with a `Date,Open,High,Low,Close[,Volume]` header.
    TabularCsv,
}

impl SourceFormat {
    /// Pick the format from the file extension and the expected row shape.
    ///
    /// Returns `None` for CSV files holding OHLCV arrays or for unknown
    /// extensions.
    pub fn detect(path: &Path, shape: RawShape) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match (ext.as_str(), shape) {
            ("json", RawShape::Ohlcv) => Some(Self::OhlcvJson),
            ("json", RawShape::Tabular) => Some(Self::TabularJson),
            ("csv", RawShape::Tabular) => Some(Self::TabularCsv),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OhlcvJson => write!(f, "ohlcv json"),
            Self::TabularJson => write!(f, "tabular json"),
            Self::TabularCsv => write!(f, "tabular csv"),
        }
    }
}

/// Read the raw rows of `path`.
pub fn load(path: &Path, format: SourceFormat) -> Result<RawInput, Report<SourceError>> {
    let content = std::fs::read_to_string(path)
        .change_context(SourceError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let raw = match format {
        SourceFormat::OhlcvJson => parse_json(&content, RawShape::Ohlcv),
        SourceFormat::TabularJson => parse_json(&content, RawShape::Tabular),
        SourceFormat::TabularCsv => parse_csv(content.as_bytes()),
    }
    .attach_with(|| format!("path: {}", path.display()))?;

    tracing::debug!(path = %path.display(), %format, rows = raw.len(), "loaded raw rows");
    Ok(raw)
}

pub fn parse_json(content: &str, shape: RawShape) -> Result<RawInput, Report<SourceError>> {
    match shape {
        RawShape::Ohlcv => serde_json::from_str::<Vec<Vec<Option<f64>>>>(content)
            .map(RawInput::Ohlcv)
            .change_context(SourceError::Parse {
                format: SourceFormat::OhlcvJson.to_string(),
            }),
        RawShape::Tabular => serde_json::from_str::<Vec<TabularRow>>(content)
            .map(RawInput::Tabular)
            .change_context(SourceError::Parse {
                format: SourceFormat::TabularJson.to_string(),
            }),
    }
}

pub fn parse_csv(reader: impl Read) -> Result<RawInput, Report<SourceError>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = reader
        .deserialize::<TabularRow>()
        .enumerate()
        .map(|(i, record)| {
            record
                .change_context(SourceError::Parse {
                    format: SourceFormat::TabularCsv.to_string(),
                })
                .attach_with(|| format!("record: {}", i + 1))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawInput::Tabular(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension_and_shape() {
        let json = Path::new("btc.json");
        let csv = Path::new("aapl.CSV");
        assert_eq!(
            SourceFormat::detect(json, RawShape::Ohlcv),
            Some(SourceFormat::OhlcvJson)
        );
        assert_eq!(
            SourceFormat::detect(json, RawShape::Tabular),
            Some(SourceFormat::TabularJson)
        );
        assert_eq!(
            SourceFormat::detect(csv, RawShape::Tabular),
            Some(SourceFormat::TabularCsv)
        );
        assert_eq!(SourceFormat::detect(csv, RawShape::Ohlcv), None);
        assert_eq!(SourceFormat::detect(Path::new("data.parquet"), RawShape::Tabular), None);
        assert_eq!(SourceFormat::detect(Path::new("noext"), RawShape::Tabular), None);
    }

    #[test]
    fn parse_ohlcv_json_with_null_volume() {
        let text = "[[1704067200000, 42000.0, 42100.5, 41950.0, 42050.0, 12.5],
                     [1704070800000, 42050.0, 42200.0, 42000.0, 42150.0, null]]";
        let RawInput::Ohlcv(rows) = parse_json(text, RawShape::Ohlcv).unwrap() else {
            panic!("expected ohlcv rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][5], Some(12.5));
        assert_eq!(rows[1][5], None);
    }

    #[test]
    fn parse_tabular_json_ignores_extra_columns() {
        let text = r#"[{"Date": "2024-01-02", "Open": 187.15, "High": 188.44,
                        "Low": 183.89, "Close": 185.64, "Adj Close": 184.9, "Volume": 82488700}]"#;
        let RawInput::Tabular(rows) = parse_json(text, RawShape::Tabular).unwrap() else {
            panic!("expected tabular rows");
        };
        assert_eq!(rows[0].date.as_deref(), Some("2024-01-02"));
        assert_eq!(rows[0].close, Some(185.64));
        assert_eq!(rows[0].volume, Some(82_488_700.0));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse_json("{not json", RawShape::Ohlcv).unwrap_err();
        assert!(matches!(err.current_context(), SourceError::Parse { .. }));
    }

    #[test]
    fn parse_csv_rows() {
        let text = "Date,Open,High,Low,Close,Adj Close,Volume\n\
                    2024-01-02,187.15,188.44,183.89,185.64,184.9,82488700\n\
                    2024-01-03,184.22,185.88,183.43,184.25,183.5,\n";
        let RawInput::Tabular(rows) = parse_csv(text.as_bytes()).unwrap() else {
            panic!("expected tabular rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].date.as_deref(), Some("2024-01-03"));
        assert_eq!(rows[1].volume, None);
    }

    #[test]
    fn csv_with_missing_column_still_parses() {
        // Missing prices surface later as a normalizer error with a row index.
        let text = "Date,Open,High,Low\n2024-01-02,1.0,2.0,0.5\n";
        let RawInput::Tabular(rows) = parse_csv(text.as_bytes()).unwrap() else {
            panic!("expected tabular rows");
        };
        assert_eq!(rows[0].close, None);
    }

    #[test]
    fn csv_with_bad_number_is_parse_error() {
        let text = "Date,Open,High,Low,Close\n2024-01-02,abc,2.0,0.5,1.0\n";
        assert!(parse_csv(text.as_bytes()).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load(Path::new("/nonexistent/bars.json"), SourceFormat::OhlcvJson).unwrap_err();
        assert!(matches!(err.current_context(), SourceError::ReadFile));
    }
}
