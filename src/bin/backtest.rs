//! Standalone `backtest` binary, equivalent to `perpbot backtest`.

use clap::Parser;
use perpbot::cli::{self, backtest::BacktestArgs};
use perpbot::config::{load_dotenv, ObservabilityEnvConfig};

#[derive(Parser)]
#[command(author, version, about = "Replay a strategy config over a historical window", long_about = None)]
struct Cli {
    #[command(flatten)]
    args: BacktestArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    cli::init_tracing();
    let cli = Cli::parse();
    let stop = cli::spawn_shutdown_watch();
    let obs = ObservabilityEnvConfig::from_env();
    let (metrics, reporter_handle) = cli::spawn_metrics_reporter(obs.enabled, obs.interval_secs, stop);

    let result = cli::backtest::run(cli.args, metrics).await;
    if let Some(handle) = reporter_handle {
        handle.abort();
    }
    result
}
