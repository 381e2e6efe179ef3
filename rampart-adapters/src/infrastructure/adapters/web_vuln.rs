use async_trait::async_trait;
use rampart_core::config::{FallbackMode, ToolConfig};
use rampart_core::domain::{ScanOptions, Tool};
use tracing::{debug, warn};

use super::{base_command, binary_available, safe_value};
use crate::domain::{AdapterError, AdapterRun, ToolAdapter};
use crate::infrastructure::fallback::apply_fallback;
use crate::infrastructure::parsers::parse_nikto_output;
use crate::infrastructure::process::ToolCommand;

/// Web server vulnerability scanner (`nikto -h <target> -nointeractive`)
///
/// Options: `tuning` (nikto tuning string), `port`.
pub struct WebVulnScannerAdapter {
    config: ToolConfig,
    fallback_mode: FallbackMode,
}

impl WebVulnScannerAdapter {
    pub fn new(config: ToolConfig, fallback_mode: FallbackMode) -> Self {
        Self {
            config,
            fallback_mode,
        }
    }

    pub fn build_command(&self, target: &str, options: &ScanOptions) -> ToolCommand {
        let mut command = base_command(&self.config)
            .args(["-h", target, "-nointeractive"]);

        if let Some(tuning) = options.get_str("tuning") {
            match safe_value(&tuning) {
                Some(tuning) => command = command.arg("-Tuning").arg(tuning),
                None => warn!(tuning = %tuning, "Ignoring invalid tuning option"),
            }
        }
        match options.get_u64("port") {
            Some(port @ 1..=65535) => command = command.arg("-port").arg(port.to_string()),
            Some(port) => warn!(port, "Ignoring out-of-range port option"),
            None => {}
        }

        command
    }
}

#[async_trait]
impl ToolAdapter for WebVulnScannerAdapter {
    fn tool(&self) -> Tool {
        Tool::WebVulnScanner
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
            .map(|output| parse_nikto_output(&output.stdout, target));
        let run = apply_fallback(self.tool(), self.fallback_mode, target, result)?;
        debug!(
            target = %target,
            count = run.findings.len(),
            fell_back = run.fell_back,
            "Web vulnerability scan finished"
        );
        Ok(run)
    }

    fn is_available(&self) -> bool {
        binary_available(&self.config)
    }
}
