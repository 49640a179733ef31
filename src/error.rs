use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("failed to read source file")]
    ReadFile,
    #[display("failed to parse {format} source")]
    Parse { format: String },
}

/// Raw input rejected by the normalizer.
#[derive(Debug, Display, Error, PartialEq)]
pub enum NormalizeError {
    #[display("data shape error at row {row}: {reason}")]
    DataShape { row: usize, reason: String },
}

#[derive(Debug, Display, Error, PartialEq)]
pub enum IndicatorError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("column {name} has {actual} values but the series has {expected} bars")]
    Misaligned {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Display, Error)]
pub enum AnalysisError {
    #[display("failed to normalize raw input")]
    Normalize,
    #[display("failed to compute indicators")]
    Indicator,
}
