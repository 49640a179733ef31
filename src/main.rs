use std::path::Path;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use futures::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_signals::config::{self, AppConfig, AssetConfig};
use market_signals::pipeline::{self, AnalysisSpec};
use market_signals::report::{AnalysisReport, AssetLabel};
use market_signals::signal::CrossoverRule;
use market_signals::source;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("source error")]
    Source,
    #[display("analysis error")]
    Analysis,
    #[display("output error")]
    Output,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(
    name = "market-signals",
    about = "Moving-average crossover signals for OHLCV bar files"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Only analyze the named assets (repeatable)
    #[arg(short, long = "asset")]
    assets: Vec<String>,

    /// Override `general.output` ("text" or "json")
    #[arg(short, long, value_parser = ["text", "json"])]
    output: Option<String>,
}

type AssetOutcome = (String, Result<AnalysisReport, Report<AppError>>);

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    for name in &cli.assets {
        if !config.assets.iter().any(|a| &a.name == name) {
            warn!(asset = %name, "requested asset is not in the config, skipping");
        }
    }
    let assets: Vec<AssetConfig> = config
        .assets
        .iter()
        .filter(|a| cli.assets.is_empty() || cli.assets.contains(&a.name))
        .cloned()
        .collect();

    if assets.is_empty() {
        warn!("no assets selected; nothing to do");
        return Ok(());
    }

    let output = cli.output.unwrap_or_else(|| config.general.output.clone());
    let total = assets.len();
    let outcomes = run_batch(assets, config.general.history_rows).await?;

    let mut failed = 0;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(report) => print_report(&report, &output)?,
            Err(e) => {
                failed += 1;
                warn!(asset = %name, error = ?e, "analysis failed (continuing)");
            }
        }
    }

    info!(total, failed, "analysis complete");
    if failed == total {
        return Err(Report::new(AppError::Analysis).attach("every selected asset failed"));
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Run every asset's pipeline on the blocking pool.
///
/// Assets are independent, so they run in parallel; outcomes come back in
/// input order.
async fn run_batch(
    assets: Vec<AssetConfig>,
    history_rows: Option<usize>,
) -> Result<Vec<AssetOutcome>, Report<AppError>> {
    let handles: Vec<_> = assets
        .into_iter()
        .map(|asset| {
            tokio::task::spawn_blocking(move || {
                let outcome = analyze_asset(&asset, history_rows);
                (asset.name, outcome)
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.change_context(AppError::Runtime))
        .collect()
}

fn analyze_asset(
    asset: &AssetConfig,
    general_history_rows: Option<usize>,
) -> Result<AnalysisReport, Report<AppError>> {
    let unvalidated = || {
        Report::new(AppError::Config).attach(format!("asset \"{}\" was not validated", asset.name))
    };
    let class = asset.asset_class().ok_or_else(unvalidated)?;
    let format = asset.source_format().ok_or_else(unvalidated)?;
    let (fast, slow) = asset.crossover_averages().ok_or_else(unvalidated)?;
    let history_rows = asset
        .history_rows(general_history_rows)
        .ok_or_else(unvalidated)?;

    let spec = AnalysisSpec {
        crossover: CrossoverRule::new(fast, slow).change_context(AppError::Config)?,
        macd: asset.macd,
        extra: asset.extra_averages(),
    };

    let raw = source::load(&asset.source, format).change_context(AppError::Source)?;
    let analysis = pipeline::analyze(&raw, &spec)
        .change_context(AppError::Analysis)
        .attach_with(|| format!("asset: {}", asset.name))?;

    info!(
        asset = %asset.name,
        symbol = %asset.symbol,
        bars = analysis.frame.len(),
        signal = %analysis.signal,
        "signal computed"
    );

    let label = AssetLabel {
        name: asset.name.clone(),
        symbol: asset.symbol.clone(),
        class,
        timeframe: asset.time_frame(),
    };
    Ok(AnalysisReport::new(
        label,
        &analysis,
        fast.column_name(),
        slow.column_name(),
        history_rows,
    ))
}

fn print_report(report: &AnalysisReport, output: &str) -> Result<(), Report<AppError>> {
    match output {
        "json" => println!("{}", report.to_json().change_context(AppError::Output)?),
        _ => println!("{}", report.to_text()),
    }
    Ok(())
}
