use async_trait::async_trait;
use rampart_core::config::{FallbackMode, ToolConfig};
use rampart_core::domain::{ScanOptions, Tool};
use tracing::{debug, warn};

use super::{base_command, binary_available, safe_value};
use crate::domain::{AdapterError, AdapterRun, ToolAdapter};
use crate::infrastructure::fallback::apply_fallback;
use crate::infrastructure::parsers::parse_nmap_xml;
use crate::infrastructure::process::ToolCommand;

/// Network port scanner (`nmap -sV -oX -`)
///
/// Options: `ports` (e.g. `"22,80,443"` or `"1-1024"`), `timing` (0-5).
pub struct PortScannerAdapter {
    config: ToolConfig,
    fallback_mode: FallbackMode,
}

impl PortScannerAdapter {
    pub fn new(config: ToolConfig, fallback_mode: FallbackMode) -> Self {
        Self {
            config,
            fallback_mode,
        }
    }

    pub fn build_command(&self, target: &str, options: &ScanOptions) -> ToolCommand {
        let mut command = base_command(&self.config).args(["-sV", "-oX", "-"]);

        if let Some(ports) = options.get_str("ports") {
            match safe_value(&ports) {
                Some(ports) => command = command.arg("-p").arg(ports),
                None => warn!(ports = %ports, "Ignoring invalid ports option"),
            }
        }
        match options.get_u64("timing") {
            Some(timing @ 0..=5) => command = command.arg(format!("-T{}", timing)),
            Some(timing) => warn!(timing, "Ignoring out-of-range timing option"),
            None => {}
        }

        command.arg(target)
    }
}

#[async_trait]
impl ToolAdapter for PortScannerAdapter {
    fn tool(&self) -> Tool {
        Tool::PortScanner
    }

    async fn execute(
        &self,
        target: &str,
        options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        let result = match self.build_command(target, options).run().await {
            Ok(output) => parse_nmap_xml(&output.stdout),
            Err(e) => Err(e),
        };
        let run = apply_fallback(self.tool(), self.fallback_mode, target, result)?;
        debug!(
            target = %target,
            count = run.findings.len(),
            fell_back = run.fell_back,
            "Port scan finished"
        );
        Ok(run)
    }

    fn is_available(&self) -> bool {
        binary_available(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> PortScannerAdapter {
        PortScannerAdapter::new(ToolConfig::new("nmap", 300), FallbackMode::Permissive)
    }

    #[test]
    fn test_default_command_line() {
        let command = adapter().build_command("example.com", &ScanOptions::new());
        assert_eq!(command.get_args(), ["-sV", "-oX", "-", "example.com"]);
    }

    #[test]
    fn test_ports_and_timing_options() {
        let options = ScanOptions::new().with("ports", "22,80").with("timing", 4);
        let command = adapter().build_command("10.0.0.1", &options);
        assert_eq!(
            command.get_args(),
            ["-sV", "-oX", "-", "-p", "22,80", "-T4", "10.0.0.1"]
        );
    }

    #[test]
    fn test_unsafe_options_are_dropped() {
        let options = ScanOptions::new()
            .with("ports", "--script=vuln")
            .with("timing", 9);
        let command = adapter().build_command("example.com", &options);
        assert_eq!(command.get_args(), ["-sV", "-oX", "-", "example.com"]);
    }
}
