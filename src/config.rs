use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::MovingAverage;
use crate::model::{AssetClass, RawShape, TimeFrame};
use crate::source::SourceFormat;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_output() -> String {
    "text".into()
}

fn default_average() -> String {
    "sma".into()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Report rendering, `"text"` | `"json"`
    #[serde(default = "default_output")]
    pub output: String,
    /// Trailing rows included in each report; defaults per asset class.
    pub history_rows: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub name: String,
    pub symbol: String,
    pub class: String,
    /// Path to the raw bar file, relative to the working directory.
    pub source: PathBuf,
    /// `"ohlcv"` | `"tabular"`; defaults per asset class.
    pub shape: Option<String>,
    pub timeframe: Option<String>,
    pub fast: Option<usize>,
    pub slow: Option<usize>,
    /// `"sma"` | `"ema"`
    #[serde(default = "default_average")]
    pub average: String,
    #[serde(default = "default_true")]
    pub macd: bool,
    #[serde(default)]
    pub extra_sma: Vec<usize>,
    #[serde(default)]
    pub extra_ema: Vec<usize>,
    /// Overrides `general.history_rows` for this asset.
    pub history_rows: Option<usize>,
}

impl AssetConfig {
    /// Asset class; only `None` for configs that skipped validation.
    pub fn asset_class(&self) -> Option<AssetClass> {
        AssetClass::from_str(&self.class)
    }

    pub fn raw_shape(&self) -> Option<RawShape> {
        match &self.shape {
            Some(shape) => RawShape::from_str(shape),
            None => self.asset_class().map(AssetClass::default_shape),
        }
    }

    pub fn source_format(&self) -> Option<SourceFormat> {
        SourceFormat::detect(&self.source, self.raw_shape()?)
    }

    pub fn time_frame(&self) -> Option<TimeFrame> {
        self.timeframe.as_deref().and_then(TimeFrame::from_str)
    }

    /// Fast and slow averages, falling back to the asset class windows.
    pub fn crossover_averages(&self) -> Option<(MovingAverage, MovingAverage)> {
        let (default_fast, default_slow) = self.asset_class()?.default_windows();
        let fast = self.fast.unwrap_or(default_fast);
        let slow = self.slow.unwrap_or(default_slow);
        match self.average.as_str() {
            "sma" => Some((MovingAverage::Sma(fast), MovingAverage::Sma(slow))),
            "ema" => Some((MovingAverage::Ema(fast), MovingAverage::Ema(slow))),
            _ => None,
        }
    }

    /// Trailing report rows: the asset's own setting, then `general`, then
    /// the asset class default.
    pub fn history_rows(&self, general: Option<usize>) -> Option<usize> {
        self.history_rows
            .or(general)
            .or_else(|| self.asset_class().map(AssetClass::default_history_rows))
    }

    pub fn extra_averages(&self) -> Vec<MovingAverage> {
        self.extra_sma
            .iter()
            .map(|&w| MovingAverage::Sma(w))
            .chain(self.extra_ema.iter().map(|&s| MovingAverage::Ema(s)))
            .collect()
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_asset_names_unique(config)?;
    for asset in &config.assets {
        validate_asset(asset)?;
    }
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    if !VALID_FORMATS.contains(&config.general.output.as_str()) {
        return Err(invalid(format!(
            "general.output \"{}\" is not valid",
            config.general.output
        )));
    }
    Ok(())
}

fn validate_asset_names_unique(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = std::collections::HashSet::new();
    for asset in &config.assets {
        if !seen.insert(asset.name.as_str()) {
            return Err(invalid(format!("assets: duplicate name \"{}\"", asset.name)));
        }
    }
    Ok(())
}

fn validate_asset(asset: &AssetConfig) -> Result<(), Report<ConfigError>> {
    let name = &asset.name;

    if asset.asset_class().is_none() {
        return Err(invalid(format!(
            "assets[\"{name}\"].class: unknown asset class \"{}\"",
            asset.class
        )));
    }
    if let Some(shape) = asset.shape.as_deref().filter(|s| RawShape::from_str(s).is_none()) {
        return Err(invalid(format!(
            "assets[\"{name}\"].shape: unknown shape \"{shape}\""
        )));
    }
    if let Some(tf) = asset.timeframe.as_deref().filter(|t| TimeFrame::from_str(t).is_none()) {
        return Err(invalid(format!(
            "assets[\"{name}\"].timeframe: unknown timeframe \"{tf}\""
        )));
    }
    if asset.source_format().is_none() {
        return Err(invalid(format!(
            "assets[\"{name}\"].source: {} is not a supported file for this shape",
            asset.source.display()
        )));
    }

    let Some((fast, slow)) = asset.crossover_averages() else {
        return Err(invalid(format!(
            "assets[\"{name}\"].average \"{}\" is not valid",
            asset.average
        )));
    };
    if fast == slow {
        return Err(invalid(format!(
            "assets[\"{name}\"]: fast and slow are both {fast}, the crossover can only hold"
        )));
    }
    for average in [fast, slow].into_iter().chain(asset.extra_averages()) {
        if average.window() == 0 {
            return Err(invalid(format!(
                "assets[\"{name}\"]: {} window must be > 0",
                average
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    fn single_asset(fields: &str) -> AppConfig {
        parse(&format!(
            r#"
[general]

[[assets]]
name = "btc"
symbol = "BTC/USDT"
{fields}
"#
        ))
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
output = "json"
history_rows = 15

[[assets]]
name = "Bitcoin"
symbol = "BTC/USDT"
class = "crypto"
source = "data/btc_1h.json"
timeframe = "1h"

[[assets]]
name = "Apple"
symbol = "AAPL"
class = "equity"
source = "data/aapl.csv"
average = "ema"
fast = 12
slow = 26
macd = false
extra_sma = [200]
"#;
        let config = parse(toml);
        validate(&config).unwrap();
        assert_eq!(config.general.history_rows, Some(15));
        assert_eq!(config.assets.len(), 2);

        let btc = &config.assets[0];
        assert_eq!(btc.source_format(), Some(SourceFormat::OhlcvJson));
        assert_eq!(btc.time_frame(), Some(TimeFrame::Hour1));
        assert_eq!(
            btc.crossover_averages(),
            Some((MovingAverage::Sma(10), MovingAverage::Sma(20)))
        );
        assert!(btc.macd);

        let aapl = &config.assets[1];
        assert_eq!(aapl.source_format(), Some(SourceFormat::TabularCsv));
        assert_eq!(
            aapl.crossover_averages(),
            Some((MovingAverage::Ema(12), MovingAverage::Ema(26)))
        );
        assert_eq!(aapl.extra_averages(), vec![MovingAverage::Sma(200)]);
        assert!(!aapl.macd);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let config = parse("[general]\n");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.general.output, "text");
        assert_eq!(config.general.history_rows, None);
        assert!(config.assets.is_empty());
        validate(&config).unwrap();
    }

    #[test]
    fn equity_defaults_to_twenty_fifty() {
        let config = single_asset("class = \"equity\"\nsource = \"x.json\"");
        let asset = &config.assets[0];
        assert_eq!(asset.raw_shape(), Some(RawShape::Tabular));
        assert_eq!(
            asset.crossover_averages(),
            Some((MovingAverage::Sma(20), MovingAverage::Sma(50)))
        );
    }

    #[test]
    fn unknown_class_rejected() {
        let config = single_asset("class = \"bond\"\nsource = \"x.json\"");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn ohlcv_csv_rejected() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.csv\"");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn explicit_shape_overrides_class_default() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.csv\"\nshape = \"tabular\"");
        validate(&config).unwrap();
        assert_eq!(config.assets[0].source_format(), Some(SourceFormat::TabularCsv));
    }

    #[test]
    fn invalid_timeframe_string_rejected() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"\ntimeframe = \"2m\"");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_window_rejected() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"\nfast = 0");
        assert!(validate(&config).is_err());

        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"\nextra_ema = [0]");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn identical_fast_and_slow_rejected() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"\nfast = 20");
        let err = validate(&config).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::Validation { .. }));

        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"\nfast = 20\nslow = 20\naverage = \"ema\"");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn history_rows_resolution_order() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"");
        assert_eq!(config.assets[0].history_rows(None), Some(15));
        assert_eq!(config.assets[0].history_rows(Some(4)), Some(4));

        let config = single_asset("class = \"equity\"\nsource = \"x.csv\"\nhistory_rows = 3");
        assert_eq!(config.assets[0].history_rows(Some(4)), Some(3));

        let config = single_asset("class = \"forex\"\nsource = \"x.csv\"");
        assert_eq!(config.assets[0].history_rows(None), Some(10));
    }

    #[test]
    fn unknown_average_rejected() {
        let config = single_asset("class = \"crypto\"\nsource = \"x.json\"\naverage = \"wma\"");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn invalid_output_rejected() {
        let config = parse("[general]\noutput = \"html\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn duplicate_asset_names_rejected() {
        let toml = r#"
[general]

[[assets]]
name = "dup"
symbol = "BTC/USDT"
class = "crypto"
source = "btc.json"

[[assets]]
name = "dup"
symbol = "ETH/USDT"
class = "crypto"
source = "eth.json"
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn missing_config_file_is_read_error() {
        let err = load(Path::new("/nonexistent/market-signals.toml")).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::ReadFile));
    }
}
