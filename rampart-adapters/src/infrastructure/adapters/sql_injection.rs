use async_trait::async_trait;
use rampart_core::config::{FallbackMode, ToolConfig};
use rampart_core::domain::{ScanOptions, Tool};
use tracing::{debug, warn};

use super::{base_command, binary_available};
use crate::domain::{AdapterError, AdapterRun, ToolAdapter};
use crate::infrastructure::fallback::apply_fallback;
use crate::infrastructure::parsers::parse_sqlmap_output;
use crate::infrastructure::process::ToolCommand;

const DEFAULT_LEVEL: u64 = 1;
const DEFAULT_RISK: u64 = 1;
const DEFAULT_CRAWL_DEPTH: u64 = 2;

/// SQL injection tester (`sqlmap -u <target> --batch`)
///
/// Options: `level` (1-5), `risk` (1-3), `forms` (bool), `crawl` (depth
/// used with `forms`).
pub struct SqlInjectionAdapter {
    config: ToolConfig,
    fallback_mode: FallbackMode,
}

impl SqlInjectionAdapter {
    pub fn new(config: ToolConfig, fallback_mode: FallbackMode) -> Self {
        Self {
            config,
            fallback_mode,
        }
    }

    pub fn build_command(&self, target: &str, options: &ScanOptions) -> ToolCommand {
        let level = bounded(options, "level", 1..=5, DEFAULT_LEVEL);
        let risk = bounded(options, "risk", 1..=3, DEFAULT_RISK);

        let mut command = base_command(&self.config)
            .args(["-u", target, "--batch"])
            .arg(format!("--level={}", level))
            .arg(format!("--risk={}", risk));

        if options.get_bool("forms").unwrap_or(false) {
            let depth = bounded(options, "crawl", 1..=10, DEFAULT_CRAWL_DEPTH);
            command = command.arg("--forms").arg(format!("--crawl={}", depth));
        }

        command
    }
}

fn bounded(
    options: &ScanOptions,
    key: &str,
    range: std::ops::RangeInclusive<u64>,
    default: u64,
) -> u64 {
    match options.get_u64(key) {
        Some(value) if range.contains(&value) => value,
        Some(value) => {
            warn!(option = key, value, default, "Option out of range, using default");
            default
        }
        None => default,
    }
}

#[async_trait]
impl ToolAdapter for SqlInjectionAdapter {
    fn tool(&self) -> Tool {
        Tool::SqlInjectionTester
    }

    async fn execute(
        &self,
        target: &str,
        options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        let result = self
            .build_command(target, options)
            .run()
            .await
            .map(|output| {
                parse_sqlmap_output(&output.stdout, target)
                    .into_iter()
                    .collect()
            });
        let run = apply_fallback(self.tool(), self.fallback_mode, target, result)?;
        debug!(
            target = %target,
            count = run.findings.len(),
            fell_back = run.fell_back,
            "SQL injection test finished"
        );
        Ok(run)
    }

    fn is_available(&self) -> bool {
        binary_available(&self.config)
    }
}
