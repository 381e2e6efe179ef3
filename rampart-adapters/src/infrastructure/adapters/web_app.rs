use async_trait::async_trait;
use rampart_core::domain::{ScanOptions, Tool};
use tracing::debug;

use crate::domain::{AdapterError, AdapterRun, ToolAdapter};
use crate::infrastructure::fallback::synthetic_findings;

/// Web application scanner without a live integration; it always reports
/// its fixed synthetic set.
#[derive(Debug, Default)]
pub struct WebAppScannerAdapter;

impl WebAppScannerAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolAdapter for WebAppScannerAdapter {
    fn tool(&self) -> Tool {
        Tool::WebAppScanner
    }

    async fn execute(
        &self,
        target: &str,
        _options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        debug!(target = %target, "Web application scanner has no live integration");
        Ok(AdapterRun::fallback(synthetic_findings(
            Tool::WebAppScanner,
            target,
        )))
    }
}
