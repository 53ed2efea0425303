//! Standalone `optimize` binary, equivalent to `perpbot optimize`.

use clap::Parser;
use perpbot::cli::{self, optimize::OptimizeArgs};
use perpbot::config::{load_dotenv, ObservabilityEnvConfig};

#[derive(Parser)]
#[command(author, version, about = "Grid-search a training window and persist ranked + OOS results", long_about = None)]
struct Cli {
    #[command(flatten)]
    args: OptimizeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    cli::init_tracing();
    let cli = Cli::parse();
    let stop = cli::spawn_shutdown_watch();
    let obs = ObservabilityEnvConfig::from_env();
    let (metrics, reporter_handle) = cli::spawn_metrics_reporter(obs.enabled, obs.interval_secs, stop);

    let result = cli::optimize::run(cli.args, metrics).await;
    if let Some(handle) = reporter_handle {
        handle.abort();
    }
    result
}
