//! Adapter registry keyed by tool

use std::collections::HashMap;
use std::sync::Arc;

use rampart_core::config::AdaptersConfig;
use rampart_core::domain::{ScanType, Tool};
use tracing::{info, warn};

use crate::domain::ToolAdapter;
use crate::infrastructure::adapters::{
    PortScannerAdapter, SqlInjectionAdapter, WebAppScannerAdapter, WebVulnScannerAdapter,
};

/// Holds one adapter per tool and resolves scan types to adapter sequences
pub struct AdapterRegistry {
    adapters: HashMap<Tool, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with the process-backed adapters built from configuration
    pub fn from_config(config: &AdaptersConfig) -> Self {
        let mode = config.fallback_mode;
        let mut registry = Self::new();
        registry.register(Arc::new(PortScannerAdapter::new(
            config.port_scanner.clone(),
            mode,
        )));
        registry.register(Arc::new(WebVulnScannerAdapter::new(
            config.web_vuln_scanner.clone(),
            mode,
        )));
        registry.register(Arc::new(SqlInjectionAdapter::new(
            config.sql_injection_tester.clone(),
            mode,
        )));
        registry.register(Arc::new(WebAppScannerAdapter::new()));
        registry
    }

    /// Register an adapter, replacing any previous one for the same tool
    pub fn register(&mut self, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.insert(adapter.tool(), adapter);
    }

    pub fn get(&self, tool: Tool) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(&tool).cloned()
    }

    /// Adapters for a scan type, in execution order. `None` if any of
    /// them is not registered.
    pub fn resolve(&self, scan_type: ScanType) -> Option<Vec<Arc<dyn ToolAdapter>>> {
        scan_type
            .tools()
            .iter()
            .map(|tool| self.get(*tool))
            .collect()
    }

    /// Log which tool binaries can be found; returns the missing tools.
    pub fn probe_availability(&self) -> Vec<Tool> {
        let mut missing = Vec::new();
        let mut tools: Vec<&Tool> = self.adapters.keys().collect();
        tools.sort_by_key(|tool| tool.as_str());

        for tool in tools {
            let Some(adapter) = self.adapters.get(tool) else {
                continue;
            };
            if adapter.is_available() {
                info!(tool = %tool, "Tool available");
            } else {
                warn!(tool = %tool, "Tool binary not found on PATH");
                missing.push(*tool);
            }
        }
        missing
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
