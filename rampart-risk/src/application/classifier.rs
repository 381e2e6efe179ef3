//! Classification of raw tool findings

use rampart_core::domain::{RawFinding, RiskLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::profiles::{NormalizedFinding, RiskProfile, select_normalized};
use crate::domain::tables::{
    BASE_CONFIDENCE, CVE_BONUS, CVE_CONFIDENCE, DATABASE_SERVICE_BONUS, DATABASE_SERVICES,
    MAX_SCORE, SENSITIVE_PORT_BONUS, SENSITIVE_PORTS, SERVICE_CONFIDENCE, VERSION_CONFIDENCE,
    impact, nvd_reference, remediation_priority,
};

const FALLBACK_PROFILE: &str = "unclassified";

/// Errors that stop a finding from being scored normally
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Finding has neither a vulnerability type nor a title")]
    EmptyFinding,

    #[error("Score for profile {profile} is not a finite number")]
    NonFiniteScore { profile: &'static str },
}

/// Scored, human-readable result for one raw finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub risk_level: RiskLevel,
    /// 0.0 to 10.0, one decimal
    pub score: f64,
    pub title: String,
    pub description: String,
    pub fix_suggestions: Vec<String>,
    pub impact: String,
    pub remediation_priority: String,
    pub references: Vec<String>,
    /// 0.0 to 1.0
    pub confidence: f64,
    /// Identifier of the matched risk profile
    pub profile: String,
    pub base_score: f64,
    pub multiplier: f64,
    /// Set when scoring failed and the informational fallback was used
    pub fallback: bool,
}

impl Classification {
    /// Suggestions joined one per line, as stored on a finding.
    pub fn fix_suggestion_text(&self) -> String {
        self.fix_suggestions.join("\n")
    }

    /// Metadata document stored alongside a finding
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "impact": self.impact,
            "remediation_priority": self.remediation_priority,
            "references": self.references,
            "confidence": self.confidence,
            "profile": self.profile,
            "multiplier": self.multiplier,
            "base_score": self.base_score,
            "fix_suggestions": self.fix_suggestions,
            "fallback": self.fallback,
        })
    }
}

/// Classify a raw finding. Never fails: anything that cannot be scored
/// becomes the informational fallback.
pub fn classify(raw: &RawFinding) -> Classification {
    match try_classify(raw) {
        Ok(classification) => classification,
        Err(e) => {
            tracing::warn!(
                error = %e,
                vulnerability_type = %raw.vulnerability_type,
                "Classification failed, using informational fallback"
            );
            fallback_classification(raw)
        }
    }
}

pub fn try_classify(raw: &RawFinding) -> Result<Classification, ClassificationError> {
    let normalized = NormalizedFinding::new(raw);
    if normalized.vulnerability_type.is_empty() && normalized.title.is_empty() {
        return Err(ClassificationError::EmptyFinding);
    }

    let profile = select_normalized(&normalized);
    let cve_id = non_empty(raw.cve_id.as_deref());
    let multiplier = multiplier(&normalized, cve_id.is_some());

    let product = profile.base_score * multiplier;
    if !product.is_finite() || product < 0.0 {
        return Err(ClassificationError::NonFiniteScore {
            profile: profile.id,
        });
    }
    let score = round_to(product.min(MAX_SCORE), 1);
    let risk_level = RiskLevel::from_score(score);

    let title = non_empty(Some(&raw.title))
        .map(str::to_string)
        .unwrap_or_else(|| profile.name.to_string());

    Ok(Classification {
        risk_level,
        score,
        title,
        description: describe(profile, raw, cve_id),
        fix_suggestions: suggestions(profile, raw, &normalized, cve_id),
        impact: impact(risk_level).to_string(),
        remediation_priority: remediation_priority(risk_level).to_string(),
        references: references(profile, cve_id),
        confidence: confidence(raw, cve_id.is_some()),
        profile: profile.id.to_string(),
        base_score: profile.base_score,
        multiplier: round_to(multiplier, 2),
        fallback: false,
    })
}

/// Fixed informational result used when scoring fails
pub fn fallback_classification(raw: &RawFinding) -> Classification {
    let title = non_empty(Some(&raw.title))
        .map(str::to_string)
        .unwrap_or_else(|| "Unclassified finding".to_string());
    let description = non_empty(raw.description.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| "The finding could not be classified automatically.".to_string());

    Classification {
        risk_level: RiskLevel::Info,
        score: 0.0,
        title,
        description,
        fix_suggestions: vec!["Review the raw tool output manually".to_string()],
        impact: impact(RiskLevel::Info).to_string(),
        remediation_priority: remediation_priority(RiskLevel::Info).to_string(),
        references: Vec::new(),
        confidence: 0.0,
        profile: FALLBACK_PROFILE.to_string(),
        base_score: 0.0,
        multiplier: 1.0,
        fallback: true,
    }
}

fn multiplier(finding: &NormalizedFinding, has_cve: bool) -> f64 {
    let mut multiplier = 1.0;
    if finding.port.is_some_and(|port| SENSITIVE_PORTS.contains(&port)) {
        multiplier += SENSITIVE_PORT_BONUS;
    }
    if finding
        .service
        .as_deref()
        .is_some_and(|service| DATABASE_SERVICES.contains(&service))
    {
        multiplier += DATABASE_SERVICE_BONUS;
    }
    if has_cve {
        multiplier += CVE_BONUS;
    }
    multiplier
}

fn confidence(raw: &RawFinding, has_cve: bool) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if has_cve {
        confidence += CVE_CONFIDENCE;
    }
    if non_empty(raw.service.as_deref()).is_some() {
        confidence += SERVICE_CONFIDENCE;
    }
    if non_empty(raw.version.as_deref()).is_some() {
        confidence += VERSION_CONFIDENCE;
    }
    round_to(confidence.min(1.0), 2)
}

fn describe(profile: &RiskProfile, raw: &RawFinding, cve_id: Option<&str>) -> String {
    let mut description = profile.description.to_string();
    let service = non_empty(raw.service.as_deref());
    let protocol = non_empty(raw.protocol.as_deref()).unwrap_or("tcp");

    match (raw.port, service) {
        (Some(port), Some(service)) => description.push_str(&format!(
            " The {} service was detected on port {}/{}.",
            service, port, protocol
        )),
        (Some(port), None) => {
            description.push_str(&format!(" Detected on port {}/{}.", port, protocol))
        }
        (None, Some(service)) => {
            description.push_str(&format!(" The {} service was detected.", service))
        }
        (None, None) => {}
    }

    if let Some(version) = non_empty(raw.version.as_deref()) {
        description.push_str(&format!(" Reported version: {}.", version));
    }
    if let Some(component) = non_empty(raw.affected_component.as_deref()) {
        description.push_str(&format!(" Affected component: {}.", component));
    }
    if let Some(cve_id) = cve_id {
        description.push_str(&format!(
            " Tracked as {}; review the advisory for affected versions.",
            cve_id
        ));
    }
    if let Some(details) = non_empty(raw.description.as_deref()) {
        description.push_str(&format!(" Tool output: {}", details));
    }

    description
}

fn suggestions(
    profile: &RiskProfile,
    raw: &RawFinding,
    finding: &NormalizedFinding,
    cve_id: Option<&str>,
) -> Vec<String> {
    let mut suggestions: Vec<String> = profile
        .fix_suggestions
        .iter()
        .map(|s| s.to_string())
        .collect();

    if let Some(cve_id) = cve_id {
        suggestions.push(format!("Apply the vendor patch that addresses {}", cve_id));
    }
    if let Some(port) = finding.port.filter(|port| SENSITIVE_PORTS.contains(port)) {
        suggestions.push(format!(
            "Restrict access to port {} with firewall rules or a VPN",
            port
        ));
    }
    if let Some(service) = finding
        .service
        .as_deref()
        .filter(|service| DATABASE_SERVICES.contains(service))
    {
        suggestions.push(format!(
            "Require authenticated, encrypted connections to {}",
            service
        ));
    }
    if let Some(version) = non_empty(raw.version.as_deref()) {
        let subject = non_empty(raw.service.as_deref())
            .or(non_empty(raw.affected_component.as_deref()))
            .unwrap_or("the affected software");
        suggestions.push(format!(
            "Upgrade {} from {} to a supported release",
            subject, version
        ));
    }

    let mut seen = std::collections::HashSet::new();
    suggestions.retain(|s| seen.insert(s.clone()));
    suggestions
}

fn references(profile: &RiskProfile, cve_id: Option<&str>) -> Vec<String> {
    let mut references: Vec<String> = profile.references.iter().map(|r| r.to_string()).collect();
    if let Some(cve_id) = cve_id {
        references.push(nvd_reference(cve_id));
    }
    references
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_finding() -> RawFinding {
        RawFinding::new("open_port", "Open port 22/tcp (ssh)")
            .with_port(22)
            .with_protocol("tcp")
            .with_service("ssh")
    }

    #[test]
    fn test_ssh_on_port_22_scores_medium() {
        let classification = classify(&ssh_finding());
        assert_eq!(classification.score, 6.4);
        assert_eq!(classification.risk_level, RiskLevel::Medium);
        assert_eq!(classification.profile, "ssh_exposed");
        assert_eq!(classification.multiplier, 1.2);
        assert!(!classification.fallback);
        assert!(classification.description.contains("port 22/tcp"));
        assert_eq!(classification.remediation_priority, "Planned (within 30 days)");
    }

    #[test]
    fn test_sql_with_cve_is_capped_critical() {
        let raw = RawFinding::new("sql_injection", "Parameter id is injectable")
            .with_cve("CVE-2021-12345");
        let classification = classify(&raw);
        assert_eq!(classification.score, 10.0);
        assert_eq!(classification.risk_level, RiskLevel::Critical);
        assert!(
            classification
                .references
                .contains(&"https://nvd.nist.gov/vuln/detail/CVE-2021-12345".to_string())
        );
        assert!(
            classification
                .fix_suggestions
                .iter()
                .any(|s| s.contains("CVE-2021-12345"))
        );
    }

    #[test]
    fn test_unmatched_open_port_is_info() {
        let raw = RawFinding::new("open_port", "Open port 80/tcp (http)")
            .with_port(80)
            .with_service("http");
        let classification = classify(&raw);
        assert_eq!(classification.score, 0.0);
        assert_eq!(classification.risk_level, RiskLevel::Info);
        assert_eq!(classification.profile, "open_port");
    }

    #[test]
    fn test_telnet_is_high() {
        let raw = RawFinding::new("open_port", "Open port 23/tcp")
            .with_port(23)
            .with_service("telnet");
        let classification = classify(&raw);
        assert_eq!(classification.score, 7.8);
        assert_eq!(classification.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_outdated_software_with_cve() {
        let raw = RawFinding::new(
            "web_vulnerability",
            "Apache/2.2.8 appears to be outdated (current is at least 2.4.54)",
        )
        .with_cve("CVE-2017-3167");
        let classification = classify(&raw);
        assert_eq!(classification.profile, "outdated_software");
        assert_eq!(classification.score, 8.3);
        assert_eq!(classification.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_confidence_components() {
        assert_eq!(classify(&ssh_finding()).confidence, 0.65);
        assert_eq!(
            classify(&ssh_finding().with_version("OpenSSH 8.9p1")).confidence,
            0.8
        );
        let full = ssh_finding()
            .with_version("OpenSSH 7.2")
            .with_cve("CVE-2016-6210");
        assert_eq!(classify(&full).confidence, 1.0);
        assert_eq!(
            classify(&RawFinding::new("web_vulnerability", "Banner")).confidence,
            0.5
        );
    }

    #[test]
    fn test_suggestions_are_deduplicated_and_contextual() {
        let raw = ssh_finding().with_version("OpenSSH 7.2");
        let classification = classify(&raw);
        let text = classification.fix_suggestion_text();
        assert!(text.contains("Restrict access to port 22"));
        assert!(text.contains("Upgrade ssh from OpenSSH 7.2"));
        let unique: std::collections::HashSet<_> = classification.fix_suggestions.iter().collect();
        assert_eq!(unique.len(), classification.fix_suggestions.len());
    }

    #[test]
    fn test_empty_finding_falls_back() {
        let raw = RawFinding::new("  ", "");
        assert_eq!(try_classify(&raw), Err(ClassificationError::EmptyFinding));

        let classification = classify(&raw);
        assert!(classification.fallback);
        assert_eq!(classification.risk_level, RiskLevel::Info);
        assert_eq!(classification.score, 0.0);
        assert_eq!(classification.profile, "unclassified");
    }

    #[test]
    fn test_metadata_shape() {
        let metadata = classify(&ssh_finding()).metadata();
        assert_eq!(metadata["profile"], "ssh_exposed");
        assert_eq!(metadata["fallback"], false);
        assert!(metadata["fix_suggestions"].is_array());
        assert!(metadata["references"].is_array());
    }
}
