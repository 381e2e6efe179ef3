//! Finding entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::RiskLevel;
use crate::domain::scan::{ScanId, Tool};

/// One result as reported by a tool, before scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    /// Tool-level category, e.g. `open_port`, `web_vulnerability`, `sql_injection`
    pub vulnerability_type: String,
    pub title: String,
    pub description: Option<String>,
    pub port: Option<u16>,
    pub service: Option<String>,
    pub protocol: Option<String>,
    /// Product/version banner when the tool detected one
    pub version: Option<String>,
    pub cve_id: Option<String>,
    pub affected_component: Option<String>,
    /// Unmodified tool output backing this finding
    pub raw_output: serde_json::Value,
}

impl RawFinding {
    pub fn new(vulnerability_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            vulnerability_type: vulnerability_type.into(),
            title: title.into(),
            description: None,
            port: None,
            service: None,
            protocol: None,
            version: None,
            cve_id: None,
            affected_component: None,
            raw_output: serde_json::Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_cve(mut self, cve_id: impl Into<String>) -> Self {
        self.cve_id = Some(cve_id.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.affected_component = Some(component.into());
        self
    }

    pub fn with_raw_output(mut self, raw_output: serde_json::Value) -> Self {
        self.raw_output = raw_output;
        self
    }
}

/// Normalized, risk-scored finding owned by a scan.
///
/// Findings are never updated once persisted. Rows a tool stored during an
/// unfinished stage are replaced when the stage runs again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub scan_id: ScanId,
    /// Tool that reported the finding
    pub tool: Tool,
    pub vulnerability_type: String,
    pub risk_level: RiskLevel,
    pub title: String,
    pub description: String,
    pub fix_suggestion: String,
    /// Score in `[0, 10]`
    pub score: f64,
    pub cve_id: Option<String>,
    pub affected_component: Option<String>,
    pub port: Option<u16>,
    pub service: Option<String>,
    pub raw_output: serde_json::Value,
    pub classification_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
