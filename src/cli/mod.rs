//! Rampart CLI - Submit scans and run the engine from the command line
//!
//! `rampart run` starts the worker pool and processes queued scans until it
//! receives Ctrl+C or SIGTERM. `rampart scan` submits a scan; with `--wait`
//! it also processes it in-process and prints the findings.

mod commands;
mod output;

pub use output::OutputFormat;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rampart_core::Config;

/// Rampart - Security scan orchestration
#[derive(Parser, Debug)]
#[command(
    name = "rampart",
    version,
    about = "Run security tools against a target and collect risk-scored findings",
    long_about = "Rampart queues scans, runs the matching security tools (nmap, nikto, sqlmap) \
                  under timeouts and retries, and stores classified findings in SQLite.\n\n\
                  Configuration is read from config/default.toml, config/$ENV.toml, \
                  config/local.toml and RAMPART__* environment variables."
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process queued scans until interrupted
    Run(commands::run::RunArgs),

    /// Submit a scan
    #[command(visible_alias = "s")]
    Scan(commands::scan::ScanArgs),

    /// Show the status of a scan
    Status(commands::inspect::StatusArgs),

    /// List the findings of a scan
    #[command(visible_alias = "f")]
    Findings(commands::inspect::FindingsArgs),

    /// Cancel a pending scan
    Cancel(commands::inspect::CancelArgs),
}

impl Cli {
    pub async fn execute(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Run(args) => commands::run::execute(config, args).await,
            Commands::Scan(args) => commands::scan::execute(config, args, self.format).await,
            Commands::Status(args) => commands::inspect::status(config, args, self.format).await,
            Commands::Findings(args) => {
                commands::inspect::findings(config, args, self.format).await
            }
            Commands::Cancel(args) => commands::inspect::cancel(config, args, self.format).await,
        }
    }
}
