//! Energomera CE102M polling service.

mod cli;
mod daemon;
mod input;
mod serial;
mod sink;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if args.is_daemon() {
        info!(
            interval_s = args.interval,
            "Energomera CE102M daemon mode (updates every {}s)", args.interval
        );
        daemon::run_daemon(&args).await
    } else {
        info!(mode = ?args.mode(), "single-shot session");
        daemon::run_once(&args).await
    }
}
