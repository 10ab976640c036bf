//! Hedge orchestrator - entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via the HEDGE_CONFIG env var).
    #[arg(short, long)]
    config: Option<String>,

    /// Force Observation mode regardless of what the config file says.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    hedge_telemetry::init_logging().context("initializing logging")?;

    info!("starting hedge orchestrator v{}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = &args.config {
        std::env::set_var("HEDGE_CONFIG", path);
    }

    let mut config = hedge_bot::AppConfig::load().context("loading configuration")?;
    if args.dry_run {
        info!("--dry-run passed: forcing Observation mode");
        config.operating_mode = hedge_bot::config::OperatingMode::Observation;
    }
    info!(?config.operating_mode, "configuration loaded");

    let app = hedge_bot::Application::build(config).await.context("wiring application")?;
    app.run_until_shutdown().await?;

    Ok(())
}
