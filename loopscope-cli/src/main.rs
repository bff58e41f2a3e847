//! ## loopscope-cli
//! **Command-line front end**
//! Lists, inspects, replays and plays event loop scenarios.

use anyhow::Context;
use clap::Parser;

use loopscope_config::LoopscopeConfig;
use loopscope_telemetry::logging::EventLogger;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LoopscopeConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LoopscopeConfig::load().context("loading configuration")?,
    };
    EventLogger::init(&config.telemetry.log_level);
    commands::run_command(cli, config).await
}
