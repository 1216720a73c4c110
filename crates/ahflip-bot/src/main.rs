//! ahflip - Entry Point
//!
//! Runs one flip engine per configured identity until every engine has
//! terminated.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Multi-identity auction flip bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via AHFLIP_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any socket is dialed
    ahflip_ws::init_crypto();

    let args = Args::parse();

    ahflip_telemetry::init_logging()?;

    info!("Starting ahflip v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > AHFLIP_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("AHFLIP_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = ahflip_bot::AppConfig::from_file(&config_path)?;
    info!(identities = ?config.identities, "Configuration loaded");

    let app = ahflip_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
