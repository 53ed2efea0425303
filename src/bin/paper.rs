//! Standalone `paper` binary, equivalent to `perpbot paper`.

use clap::Parser;
use perpbot::cli::{self, paper::PaperArgs};
use perpbot::config::{load_dotenv, ObservabilityEnvConfig};

#[derive(Parser)]
#[command(author, version, about = "Run (or resume) a paper-trading account set against live ingest", long_about = None)]
struct Cli {
    #[command(flatten)]
    args: PaperArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    cli::init_tracing();
    let cli = Cli::parse();
    let stop = cli::spawn_shutdown_watch();
    let obs = ObservabilityEnvConfig::from_env();
    let (metrics, reporter_handle) = cli::spawn_metrics_reporter(obs.enabled, obs.interval_secs, stop.clone());

    let result = cli::paper::run(cli.args, stop, metrics).await;
    if let Some(handle) = reporter_handle {
        handle.abort();
    }
    result
}
