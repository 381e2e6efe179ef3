//! Scan value objects

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(Uuid);

impl ScanId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ScanId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ScanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// External tool driven by one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Network port scanner
    PortScanner,
    /// Web server vulnerability scanner
    WebVulnScanner,
    /// SQL injection tester
    SqlInjectionTester,
    /// Web application scanner (no live integration)
    WebAppScanner,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PortScanner => "port_scanner",
            Self::WebVulnScanner => "web_vuln_scanner",
            Self::SqlInjectionTester => "sql_injection_tester",
            Self::WebAppScanner => "web_app_scanner",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::PortScanner,
            Self::WebVulnScanner,
            Self::SqlInjectionTester,
            Self::WebAppScanner,
        ]
        .into_iter()
        .find(|tool| tool.as_str() == s)
        .ok_or_else(|| format!("unknown tool: {}", s))
    }
}

/// Tools run by a combined scan, in execution order
const COMBINED_TOOLS: [Tool; 3] = [
    Tool::PortScanner,
    Tool::WebVulnScanner,
    Tool::SqlInjectionTester,
];

/// Requested kind of scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    PortScan,
    WebVuln,
    SqlInjection,
    WebApp,
    /// Every live tool, strictly one after another
    Combined,
}

impl ScanType {
    pub const ALL: [ScanType; 5] = [
        Self::PortScan,
        Self::WebVuln,
        Self::SqlInjection,
        Self::WebApp,
        Self::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PortScan => "port_scan",
            Self::WebVuln => "web_vuln",
            Self::SqlInjection => "sql_injection",
            Self::WebApp => "web_app",
            Self::Combined => "combined",
        }
    }

    /// Tools this scan type runs, in the order they must run.
    pub fn tools(&self) -> &'static [Tool] {
        match self {
            Self::PortScan => &[Tool::PortScanner],
            Self::WebVuln => &[Tool::WebVulnScanner],
            Self::SqlInjection => &[Tool::SqlInjectionTester],
            Self::WebApp => &[Tool::WebAppScanner],
            Self::Combined => &COMBINED_TOOLS,
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a scan type string outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported scan type: {0}")]
pub struct UnsupportedScanType(pub String);

impl FromStr for ScanType {
    type Err = UnsupportedScanType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnsupportedScanType(s.to_string()))
    }
}

/// Scan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Complete,
    Error,
    Cancelled,
}

impl ScanStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Pending ──► Running ──► Complete
    ///   │  │         │
    ///   │  └──► Error ◄┘
    ///   └──► Cancelled
    /// ```
    pub fn valid_transitions(&self) -> &[ScanStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Cancelled, Self::Error],
            Self::Running => &[Self::Complete, Self::Error],
            Self::Complete | Self::Error | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: ScanStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown scan status: {}", other)),
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid scan transition from {from} to {to}")]
pub struct ScanTransitionError {
    pub from: ScanStatus,
    pub to: ScanStatus,
}

/// Completion percentage, always within 0..=100
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "u8", into = "u8")]
pub struct Progress(u8);

impl Progress {
    pub const ZERO: Progress = Progress(0);
    pub const COMPLETE: Progress = Progress(100);

    /// Values above 100 are clamped.
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl From<u8> for Progress {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Progress> for u8 {
    fn from(progress: Progress) -> Self {
        progress.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Tool-specific scan options supplied by the submitter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanOptions(serde_json::Map<String, serde_json::Value>);

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// String value; numbers are rendered as strings.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer value; numeric strings are accepted.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> serde_json::Map<String, serde_json::Value> {
        self.0
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for ScanOptions {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}
