//! Single-binary entrypoint dispatching to one of the four subsystems. Each
//! is also reachable as its own binary under `src/bin/` for operators who
//! prefer a dedicated process per subsystem (spec §2 "CLI entrypoints").

use clap::{Parser, Subcommand};
use perpbot::cli::{self, backtest::BacktestArgs, ingest::IngestArgs, optimize::OptimizeArgs, paper::PaperArgs};
use perpbot::config::{load_dotenv, ObservabilityEnvConfig};

#[derive(Parser)]
#[command(author, version, about = "Single-instrument perpetual-futures research and paper-trading platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backfill or continuously poll candle history.
    Ingest(IngestArgs),
    /// Replay a strategy config over a historical window.
    Backtest(BacktestArgs),
    /// Grid-search a training window and persist ranked + OOS results.
    Optimize(OptimizeArgs),
    /// Run (or resume) a paper-trading account set against live ingest.
    Paper(PaperArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    cli::init_tracing();

    let args = Cli::parse();
    let stop = cli::spawn_shutdown_watch();

    let obs = ObservabilityEnvConfig::from_env();
    let (metrics, reporter_handle) = cli::spawn_metrics_reporter(obs.enabled, obs.interval_secs, stop.clone());

    let result = match args.command {
        Commands::Ingest(a) => cli::ingest::run(a, stop, metrics).await,
        Commands::Backtest(a) => cli::backtest::run(a, metrics).await,
        Commands::Optimize(a) => cli::optimize::run(a, metrics).await,
        Commands::Paper(a) => cli::paper::run(a, stop, metrics).await,
    };

    if let Some(handle) = reporter_handle {
        handle.abort();
    }
    result
}
