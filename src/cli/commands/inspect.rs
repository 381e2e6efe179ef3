//! Status, findings and cancel commands
//!
//! These read and update the database directly and never start workers.

use anyhow::{Context, Result};
use clap::Args;
use rampart_core::Config;
use rampart_core::domain::{RiskLevel, ScanId};

use crate::cli::OutputFormat;
use crate::cli::output;
use crate::create_engine;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    pub scan_id: ScanId,
}

/// Arguments for the findings command
#[derive(Args, Debug)]
pub struct FindingsArgs {
    pub scan_id: ScanId,

    /// Only show findings at or above this level (info, low, medium, high, critical)
    #[arg(long, default_value = "info")]
    pub min_risk: RiskLevel,
}

/// Arguments for the cancel command
#[derive(Args, Debug)]
pub struct CancelArgs {
    pub scan_id: ScanId,
}

pub async fn status(config: Config, args: StatusArgs, format: OutputFormat) -> Result<()> {
    let engine = create_engine(config).await?;
    let scan = engine
        .service()
        .find_scan(args.scan_id)
        .await?
        .with_context(|| format!("Scan not found: {}", args.scan_id))?;
    let job = engine.service().find_scan_job_status(args.scan_id).await?;
    output::print_scan(format, &scan, job.as_ref())
}

pub async fn findings(config: Config, args: FindingsArgs, format: OutputFormat) -> Result<()> {
    let engine = create_engine(config).await?;
    engine
        .service()
        .find_scan(args.scan_id)
        .await?
        .with_context(|| format!("Scan not found: {}", args.scan_id))?;

    let findings: Vec<_> = engine
        .service()
        .list_findings(args.scan_id)
        .await?
        .into_iter()
        .filter(|finding| finding.risk_level >= args.min_risk)
        .collect();
    output::print_findings(format, &findings)
}

pub async fn cancel(config: Config, args: CancelArgs, format: OutputFormat) -> Result<()> {
    let engine = create_engine(config).await?;
    let scan = engine
        .service()
        .cancel_scan(args.scan_id)
        .await
        .with_context(|| format!("Failed to cancel scan {}", args.scan_id))?;
    output::print_scan(format, &scan, None)
}
