//! Run Command - Long-running worker process

use anyhow::{Context, Result};
use clap::Args;
use rampart_core::Config;

use crate::create_engine;
use crate::shutdown::shutdown_signal;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the number of concurrently active jobs
    #[arg(short, long)]
    pub concurrency: Option<usize>,
}

pub async fn execute(mut config: Config, args: RunArgs) -> Result<()> {
    if let Some(concurrency) = args.concurrency {
        config.queue.concurrency = concurrency.max(1);
    }
    let shutdown_timeout = config.orchestrator.shutdown_timeout();

    let engine = create_engine(config)
        .await
        .context("Failed to initialize the scan engine")?;
    let handle = engine
        .start()
        .await
        .context("Failed to start background workers")?;

    let counts = engine.queue().counts().await;
    tracing::info!(
        waiting = counts.waiting,
        "Rampart running, press Ctrl+C to stop"
    );

    shutdown_signal(engine.shutdown_token()).await;

    if handle.join(shutdown_timeout).await {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!("Shutdown complete; interrupted jobs resume on next start");
    }
    Ok(())
}
