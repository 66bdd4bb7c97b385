//! stowage upload server entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked WebSocket upload server")]
struct Cli {
    /// Configuration file, created with defaults when missing
    #[arg(short, long, default_value = "stowage.toml")]
    config: PathBuf,

    /// Listening port, overrides `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting stowage");

    let mut config = config::Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    tracing::info!(path = %cli.config.display(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("stowage shut down cleanly");
    Ok(())
}
