//! Shared fixtures for engine-level tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rampart::Config;
use rampart_adapters::{AdapterError, AdapterRegistry, AdapterRun, ToolAdapter};
use rampart_core::domain::{RawFinding, Scan, ScanId, ScanOptions, ScanRepository, Tool};

/// Port scanner stand-in reporting an open SSH port
pub struct SshPortAdapter;

#[async_trait]
impl ToolAdapter for SshPortAdapter {
    fn tool(&self) -> Tool {
        Tool::PortScanner
    }

    async fn execute(
        &self,
        _target: &str,
        _options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        Ok(AdapterRun::live(vec![
            RawFinding::new("open_port", "Open port 22/tcp")
                .with_port(22)
                .with_service("ssh")
                .with_protocol("tcp")
                .with_version("OpenSSH 7.4"),
        ]))
    }
}

pub fn registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(SshPortAdapter));
    registry
}

/// Configuration backed by a SQLite file inside `dir`
pub fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.database.url = format!("sqlite://{}", dir.join("rampart.db").display());
    config.queue.backoff_base_ms = 10;
    config.reconciliation.enabled = false;
    config.orchestrator.shutdown_timeout_seconds = 5;
    config
}

/// Poll the repository until the scan is terminal or `timeout` passes.
pub async fn wait_for_terminal(
    repository: &Arc<dyn ScanRepository>,
    id: ScanId,
    timeout: Duration,
) -> Scan {
    tokio::time::timeout(timeout, async {
        loop {
            let scan = repository
                .find_scan(id)
                .await
                .unwrap()
                .expect("scan exists");
            if scan.is_terminal() {
                return scan;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("scan reached a terminal status in time")
}
