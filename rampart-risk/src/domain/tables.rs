//! Fixed per-level texts and score adjustments

use rampart_core::domain::RiskLevel;

/// Ports whose exposure alone raises the score
pub const SENSITIVE_PORTS: [u16; 3] = [22, 23, 3389];
/// Services whose exposure alone raises the score
pub const DATABASE_SERVICES: [&str; 3] = ["mysql", "postgresql", "mssql"];

pub const SENSITIVE_PORT_BONUS: f64 = 0.2;
pub const DATABASE_SERVICE_BONUS: f64 = 0.3;
pub const CVE_BONUS: f64 = 0.4;

pub const BASE_CONFIDENCE: f64 = 0.5;
pub const CVE_CONFIDENCE: f64 = 0.2;
pub const SERVICE_CONFIDENCE: f64 = 0.15;
pub const VERSION_CONFIDENCE: f64 = 0.15;

pub const MAX_SCORE: f64 = 10.0;

pub fn impact(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => {
            "Full compromise of the affected system or its data is likely and may be automated."
        }
        RiskLevel::High => {
            "An attacker can gain significant access to sensitive data or functionality."
        }
        RiskLevel::Medium => {
            "Exploitation is possible under some conditions and may expose limited data."
        }
        RiskLevel::Low => "Limited direct impact; may assist an attacker in further steps.",
        RiskLevel::Info => "No direct security impact observed.",
    }
}

pub fn remediation_priority(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "Immediate (within 24 hours)",
        RiskLevel::High => "Urgent (within 7 days)",
        RiskLevel::Medium => "Planned (within 30 days)",
        RiskLevel::Low => "Scheduled (within 90 days)",
        RiskLevel::Info => "Informational (no action required)",
    }
}

pub fn nvd_reference(cve_id: &str) -> String {
    format!("https://nvd.nist.gov/vuln/detail/{}", cve_id)
}
