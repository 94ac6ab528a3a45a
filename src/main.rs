mod anchor;
mod config;
mod error;
mod host;
mod indicator;
mod model;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use host::RequestManager;
use indicator::period::PeriodRangeKernel;
use indicator::vwap::VwapKernel;
use indicator::{ComputeInput, ComputeKernel};
use model::{AnchorSettings, Bar};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("failed to load bars")]
    Input,
    #[display("indicator computation failed")]
    Compute,
    #[display("failed to write output")]
    Output,
}

#[derive(Parser)]
#[command(name = "anchored-vwap", about = "Anchored VWAP and period range indicators")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Anchored VWAP with standard deviation bands
    Vwap(ComputeArgs),
    /// Running high/low/mid of each anchor period
    Period(ComputeArgs),
}

#[derive(Args)]
struct ComputeArgs {
    /// JSON file holding an array of bars sorted by time
    #[arg(long)]
    bars: PathBuf,
    /// Ticker symbol; picks the default anchor time
    #[arg(long)]
    ticker: String,
    /// Unix seconds of the first visible bar; omit to process all history
    #[arg(long)]
    visible_start: Option<i64>,
    /// Overrides the configured timezone
    #[arg(long)]
    timezone: Option<String>,
}

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

    let lookback_cap = config.engine.lookback_cap;
    match cli.command {
        Command::Vwap(args) => {
            let input = build_input(
                &args,
                config.vwap.anchor_settings(),
                &config.vwap.timezone,
            )?;
            let manager = RequestManager::new(
                VwapKernel::new(lookback_cap),
                config.vwap_host_options(),
            );
            run_kernel(&manager, input).await
        }
        Command::Period(args) => {
            let input = build_input(
                &args,
                config.period.anchor_settings(),
                &config.period.timezone,
            )?;
            let manager = RequestManager::new(
                PeriodRangeKernel::new(lookback_cap),
                config.period_host_options(),
            );
            run_kernel(&manager, input).await
        }
    }
}

fn init_tracing(config: &AppConfig) {
    // Logs go to stderr so stdout carries only the result JSON.
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

fn build_input(
    args: &ComputeArgs,
    settings: AnchorSettings,
    default_timezone: &str,
) -> Result<ComputeInput, Report<AppError>> {
    let content = std::fs::read_to_string(&args.bars)
        .change_context(AppError::Input)
        .attach_with(|| format!("path: {}", args.bars.display()))?;
    let data: Vec<Bar> = serde_json::from_str(&content)
        .change_context(AppError::Input)
        .attach_with(|| format!("path: {}", args.bars.display()))?;

    info!(
        bars = data.len(),
        ticker = %args.ticker,
        visible_start = ?args.visible_start,
        "bars loaded"
    );

    Ok(ComputeInput {
        data,
        settings,
        ticker: args.ticker.clone(),
        timezone: args
            .timezone
            .clone()
            .unwrap_or_else(|| default_timezone.to_owned()),
        visible_start: args.visible_start,
    })
}

async fn run_kernel<K>(manager: &RequestManager<K>, input: K::Input) -> Result<(), Report<AppError>>
where
    K: ComputeKernel,
    K::Output: Serialize,
{
    let result = manager.compute(input).await;
    if manager.is_faulted() {
        tracing::error!("execution host faulted");
    }
    manager.terminate();
    let output = result.change_context(AppError::Compute)?;

    let json = serde_json::to_string_pretty(&output).change_context(AppError::Output)?;
    println!("{json}");
    Ok(())
}
