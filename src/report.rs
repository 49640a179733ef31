use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::model::{AssetClass, Bar, TimeFrame};
use crate::pipeline::Analysis;
use crate::signal::SignalAction;

/// Read-only snapshot of one asset's analysis, ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub name: String,
    pub symbol: String,
    pub class: AssetClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<TimeFrame>,
    pub signal: SignalAction,
    pub fast: String,
    pub slow: String,
    pub bars: usize,
    pub last_bar: Option<Bar>,
    /// Last-row value of every indicator column; `None` while warming up.
    pub indicators: BTreeMap<String, Option<f64>>,
    /// Bars each indicator needs before its first defined value.
    pub warm_up: BTreeMap<String, usize>,
    pub history: Vec<HistoryRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    #[serde(flatten)]
    pub bar: Bar,
    pub indicators: BTreeMap<String, Option<f64>>,
}

/// Identity of the asset a report belongs to.
#[derive(Debug, Clone)]
pub struct AssetLabel {
    pub name: String,
    pub symbol: String,
    pub class: AssetClass,
    pub timeframe: Option<TimeFrame>,
}

impl AnalysisReport {
    /// Snapshot `analysis`, keeping the trailing `history_rows` rows.
    pub fn new(
        label: AssetLabel,
        analysis: &Analysis,
        fast: String,
        slow: String,
        history_rows: usize,
    ) -> Self {
        let frame = &analysis.frame;
        let bars = frame.series().bars();
        let names: Vec<&str> = frame.column_names().collect();

        let row_values = |index: usize| -> BTreeMap<String, Option<f64>> {
            names
                .iter()
                .map(|&name| (name.to_string(), frame.value_at(name, index)))
                .collect()
        };

        let start = bars.len().saturating_sub(history_rows);
        let history = bars[start..]
            .iter()
            .enumerate()
            .map(|(offset, bar)| HistoryRow {
                bar: bar.clone(),
                indicators: row_values(start + offset),
            })
            .collect();

        let indicators = names
            .iter()
            .map(|&name| (name.to_string(), frame.last_value(name)))
            .collect();
        let warm_up = names
            .iter()
            .filter_map(|&name| Some((name.to_string(), frame.warm_up(name)?)))
            .collect();

        Self {
            name: label.name,
            symbol: label.symbol,
            class: label.class,
            timeframe: label.timeframe,
            signal: analysis.signal,
            fast,
            slow,
            bars: bars.len(),
            last_bar: bars.last().cloned(),
            indicators,
            warm_up,
            history,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let title = match self.timeframe {
            Some(tf) => format!("{} ({}) - {}", self.name, self.symbol, tf),
            None => format!("{} ({})", self.name, self.symbol),
        };
        let _ = writeln!(out, "{title} [{}]", self.class);
        let _ = writeln!(
            out,
            "  signal: {}  ({} vs {}, {} bars)",
            self.signal, self.fast, self.slow, self.bars
        );

        if let Some(bar) = &self.last_bar {
            let volume = bar.volume.map_or_else(|| "n/a".to_string(), |v| format!("{v}"));
            let _ = writeln!(
                out,
                "  last:   {}  O {} H {} L {} C {} V {}",
                bar.timestamp.format("%Y-%m-%d %H:%M"),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                volume
            );
        }

        for (name, value) in &self.indicators {
            match (value, self.warm_up.get(name)) {
                (None, Some(warm_up)) => {
                    let _ = writeln!(
                        out,
                        "  {name:<10} -  (defined from bar {} of {})",
                        warm_up + 1,
                        self.bars
                    );
                }
                _ => {
                    let _ = writeln!(out, "  {name:<10} {}", fmt_value(*value));
                }
            }
        }

        if !self.history.is_empty() {
            let names: Vec<&String> = self.indicators.keys().collect();
            let mut header = format!(
                "  {:<17} {:>12} {:>12} {:>12} {:>12} {:>12}",
                "time", "open", "high", "low", "close", "volume"
            );
            for name in &names {
                let _ = write!(header, " {name:>12}");
            }
            let _ = writeln!(out, "{header}");
            for row in &self.history {
                let bar = &row.bar;
                let mut line = format!(
                    "  {:<17} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12}",
                    bar.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    fmt_value(bar.volume)
                );
                for name in &names {
                    let value = row.indicators.get(*name).copied().flatten();
                    let _ = write!(line, " {:>12}", fmt_value(value));
                }
                let _ = writeln!(out, "{line}");
            }
        }
        out
    }
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}
