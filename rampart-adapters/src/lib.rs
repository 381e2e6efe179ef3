//! Rampart Adapters - External security tool integrations
//!
//! Each [`ToolAdapter`] turns a target and its scan options into a tool
//! command line, runs it under a timeout and parses the output into
//! [`RawFinding`](rampart_core::domain::RawFinding)s. When a tool cannot
//! produce output the configured [`FallbackMode`](rampart_core::config::FallbackMode)
//! decides between a fixed synthetic set and surfacing the failure.
//!
//! The [`AdapterRegistry`] maps a [`ScanType`](rampart_core::domain::ScanType)
//! to the ordered adapters that serve it.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::registry::AdapterRegistry;
pub use domain::{AdapterError, AdapterRun, ToolAdapter};
pub use infrastructure::adapters::{
    PortScannerAdapter, SqlInjectionAdapter, WebAppScannerAdapter, WebVulnScannerAdapter,
};
pub use infrastructure::process::{ProcessOutput, ToolCommand};
