//! Scan Command - Submit a scan, optionally waiting for its findings

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use rampart_core::Config;
use rampart_core::domain::{Scan, ScanId, ScanOptions, ScanType};
use rampart_orchestrator::{JobOptions, ScanJobService};
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::cli::output;
use crate::create_engine;
use crate::shutdown::shutdown_signal;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Host, URL or address to scan
    pub target: String,

    /// Scan type (port_scan, web_vuln, sql_injection, web_app, combined)
    #[arg(short = 't', long = "type", default_value = "port_scan")]
    pub scan_type: ScanType,

    /// Tool option as key=value; values are read as JSON when they parse
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,

    /// Queue priority, lower runs first
    #[arg(short, long, allow_negative_numbers = true)]
    pub priority: Option<i32>,

    /// Seconds to hold the job before it becomes claimable
    #[arg(long)]
    pub delay: Option<u64>,

    /// Owner recorded on the scan
    #[arg(long, env = "RAMPART_USER")]
    pub user: Option<String>,

    /// Process the scan in this process and print its findings
    #[arg(short, long)]
    pub wait: bool,
}

/// Parse `key=value`. The value is JSON when it parses (`ports=22`,
/// `aggressive=true`) and a plain string otherwise.
pub fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("option key cannot be empty in '{}'", raw));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

impl ScanArgs {
    fn scan(&self) -> Scan {
        let options = self
            .options
            .iter()
            .fold(ScanOptions::new(), |options, (key, value)| {
                options.with(key.clone(), value.clone())
            });
        let scan = Scan::new(self.target.clone(), self.scan_type, options);
        match &self.user {
            Some(user) => scan.with_user(user.clone()),
            None => scan,
        }
    }

    fn job_options(&self, default_priority: i32) -> JobOptions {
        let options = JobOptions::default().with_priority(self.priority.unwrap_or(default_priority));
        match self.delay {
            Some(seconds) => options.with_delay(Duration::from_secs(seconds)),
            None => options,
        }
    }
}

pub async fn execute(config: Config, args: ScanArgs, format: OutputFormat) -> Result<()> {
    if args.target.trim().is_empty() {
        bail!("Target cannot be empty");
    }
    let shutdown_timeout = config.orchestrator.shutdown_timeout();

    let engine = create_engine(config)
        .await
        .context("Failed to initialize the scan engine")?;
    let job_options = args.job_options(engine.queue().settings().default_priority);

    if !args.wait {
        let (scan, job_id) = engine
            .service()
            .submit_scan(args.scan(), job_options)
            .await
            .context("Failed to submit scan")?;
        output::print_submission(format, &scan, job_id)?;
        return Ok(());
    }

    // Workers start before submission so recovery cannot race the new job
    let handle = engine
        .start()
        .await
        .context("Failed to start background workers")?;
    let (scan, job_id) = engine
        .service()
        .submit_scan(args.scan(), job_options)
        .await
        .context("Failed to submit scan")?;
    tracing::info!(scan_id = %scan.id, job_id = %job_id, "Waiting for scan to finish");

    let token = engine.shutdown_token();
    let finished = tokio::select! {
        scan = wait_for_terminal(engine.service(), scan.id) => Some(scan?),
        _ = shutdown_signal(token.clone()) => None,
    };
    token.cancel();
    handle.join(shutdown_timeout).await;

    let Some(scan) = finished else {
        bail!("Interrupted before scan {} finished", scan.id);
    };
    let findings = engine.service().list_findings(scan.id).await?;
    let job = engine.service().get_job_status(job_id).await;
    output::print_scan(format, &scan, job.as_ref())?;
    output::print_findings(format, &findings)?;
    Ok(())
}

async fn wait_for_terminal(service: &ScanJobService, scan_id: ScanId) -> Result<Scan> {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut last_progress = None;
    loop {
        interval.tick().await;
        let scan = service
            .find_scan(scan_id)
            .await?
            .with_context(|| format!("Scan {} disappeared", scan_id))?;
        if scan.is_terminal() {
            return Ok(scan);
        }
        if last_progress != Some(scan.progress) {
            tracing::info!(status = %scan.status, progress = %scan.progress, "Scan progress");
            last_progress = Some(scan.progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option_reads_json_values() {
        assert_eq!(
            parse_option("ports=22").unwrap(),
            ("ports".to_string(), Value::from(22))
        );
        assert_eq!(
            parse_option("aggressive=true").unwrap(),
            ("aggressive".to_string(), Value::Bool(true))
        );
    }

    #[test]
    fn test_parse_option_falls_back_to_string() {
        assert_eq!(
            parse_option("ports=1-1024").unwrap(),
            ("ports".to_string(), Value::String("1-1024".to_string()))
        );
        assert_eq!(
            parse_option("cookie=a=b").unwrap(),
            ("cookie".to_string(), Value::String("a=b".to_string()))
        );
    }

    #[test]
    fn test_parse_option_rejects_missing_key() {
        assert!(parse_option("ports").is_err());
        assert!(parse_option("=22").is_err());
    }

    #[test]
    fn test_scan_args_build_scan_and_job_options() {
        let args = ScanArgs {
            target: "example.com".to_string(),
            scan_type: ScanType::WebVuln,
            options: vec![("ssl".to_string(), Value::Bool(true))],
            priority: None,
            delay: Some(5),
            user: Some("alice".to_string()),
            wait: false,
        };

        let scan = args.scan();
        assert_eq!(scan.scan_type, ScanType::WebVuln);
        assert_eq!(scan.options.get_bool("ssl"), Some(true));
        assert_eq!(scan.user_id.as_deref(), Some("alice"));

        let options = args.job_options(7);
        assert_eq!(options.priority, 7);
        assert_eq!(options.delay, Duration::from_secs(5));
    }
}
