//! Tool adapter trait and its error type

use std::time::Duration;

use async_trait::async_trait;
use rampart_core::domain::{RawFinding, ScanOptions, Tool};
use thiserror::Error;

/// Failure of one tool invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Failed to spawn {binary}: {message}")]
    Spawn { binary: String, message: String },

    #[error("{binary} exited with {status}: {stderr}")]
    NonZeroExit {
        binary: String,
        status: String,
        stderr: String,
    },

    #[error("{binary} timed out after {timeout:?}")]
    Timeout { binary: String, timeout: Duration },

    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: Tool, message: String },
}

impl AdapterError {
    /// Process-level failures that a later attempt may not hit
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Parse { .. })
    }

    pub fn parse(tool: Tool, message: impl Into<String>) -> Self {
        Self::Parse {
            tool,
            message: message.into(),
        }
    }
}

/// Findings from one tool run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterRun {
    pub findings: Vec<RawFinding>,
    /// Set when the findings stand in for output the tool failed to
    /// produce: its synthetic set, or an empty set for unparseable output.
    pub fell_back: bool,
}

impl AdapterRun {
    pub fn live(findings: Vec<RawFinding>) -> Self {
        Self {
            findings,
            fell_back: false,
        }
    }

    pub fn fallback(findings: Vec<RawFinding>) -> Self {
        Self {
            findings,
            fell_back: true,
        }
    }
}

impl From<Vec<RawFinding>> for AdapterRun {
    fn from(findings: Vec<RawFinding>) -> Self {
        Self::live(findings)
    }
}

/// Runs one external tool against a target.
///
/// Implementations absorb parse failures themselves and, in permissive
/// mode, process failures too. An `Err` therefore means the failure should
/// reach the job retry layer.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn tool(&self) -> Tool;

    async fn execute(
        &self,
        target: &str,
        options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError>;

    /// Whether the tool's executable can be found. Adapters without a
    /// binary are always available.
    fn is_available(&self) -> bool {
        true
    }
}
