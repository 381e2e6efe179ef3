//! Rampart - Main application entry point

use anyhow::Context;
use clap::Parser;

use rampart::cli::Cli;
use rampart::{Config, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        // Only warn if it's not a "file not found" error
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().context(
        "Failed to load configuration. Check config/*.toml, DATABASE_URL and RAMPART__* env vars",
    )?;

    // Logging settings come from the loaded configuration
    init_tracing(&config.logging)?;

    cli.execute(config).await
}
