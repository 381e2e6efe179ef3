//! Terminal rendering for CLI results

use anyhow::Result;
use clap::ValueEnum;
use rampart_core::domain::{Finding, Scan};
use rampart_orchestrator::{JobId, JobStatusView};
use serde_json::json;

/// Output format for CLI results
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON for machine processing
    Json,
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_submission(format: OutputFormat, scan: &Scan, job_id: JobId) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "scan": scan, "job_id": job_id })),
        OutputFormat::Table => {
            println!("Scan {} queued as job {}", scan.id, job_id);
            println!("  target: {}  type: {}", scan.target, scan.scan_type);
            println!("Run `rampart run` to process it.");
            Ok(())
        }
    }
}

pub fn print_scan(format: OutputFormat, scan: &Scan, job: Option<&JobStatusView>) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "scan": scan, "job": job })),
        OutputFormat::Table => {
            println!("Scan      {}", scan.id);
            println!("Target    {}", scan.target);
            println!("Type      {}", scan.scan_type);
            println!("Status    {}", scan.status);
            println!("Progress  {}", scan.progress);
            if let Some(user) = &scan.user_id {
                println!("Owner     {}", user);
            }
            if let Some(started) = scan.started_at {
                println!("Started   {}", started.to_rfc3339());
            }
            if let Some(completed) = scan.completed_at {
                println!("Finished  {}", completed.to_rfc3339());
            }
            if let Some(error) = &scan.error_message {
                println!("Error     {}", error);
            }
            if let Some(job) = job {
                println!(
                    "Job       {} {} (attempt {}/{})",
                    job.id, job.state, job.attempts, job.max_attempts
                );
                if let Some(next) = job.next_attempt_at {
                    println!("Next try  {}", next.to_rfc3339());
                }
            }
            Ok(())
        }
    }
}

pub fn print_findings(format: OutputFormat, findings: &[Finding]) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!(findings)),
        OutputFormat::Table => {
            if findings.is_empty() {
                println!("No findings.");
                return Ok(());
            }

            let mut sorted: Vec<&Finding> = findings.iter().collect();
            sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

            println!("{:<9} {:>5}  {:<24} {}", "RISK", "SCORE", "TYPE", "TITLE");
            for finding in sorted {
                println!(
                    "{:<9} {:>5.1}  {:<24} {}",
                    finding.risk_level.as_str(),
                    finding.score,
                    finding.vulnerability_type,
                    finding.title
                );
                if let Some(cve) = &finding.cve_id {
                    println!("{:<41} {}", "", cve);
                }
            }
            println!("{} findings", findings.len());
            Ok(())
        }
    }
}
