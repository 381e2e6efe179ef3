//! SQL injection tester output parser

use once_cell::sync::Lazy;
use regex::Regex;
use rampart_core::domain::RawFinding;

static RE_INJECTION_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)identified the following injection point|parameter '[^']+' (?:is|appears to be) '[^']*' injectable|parameter '[^']+' is vulnerable",
    )
    .expect("valid injection regex")
});

static RE_PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Parameter:\s*(\S+)\s*\(([^)]+)\)").expect("valid parameter regex"));

static RE_TECHNIQUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Type:\s*(.+?)\s*$").expect("valid technique regex"));

static RE_PAYLOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Payload:\s*(.+?)\s*$").expect("valid payload regex"));

static RE_DBMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)back-end DBMS(?: is|:)\s*(.+?)\s*$").expect("valid DBMS regex")
});

/// Match the injection phrase; all injection points collapse into one finding.
pub fn parse_sqlmap_output(output: &str, target: &str) -> Option<RawFinding> {
    if !RE_INJECTION_FOUND.is_match(output) {
        return None;
    }

    let parameters: Vec<String> = RE_PARAMETER
        .captures_iter(output)
        .map(|c| format!("{} ({})", &c[1], &c[2]))
        .collect();
    let techniques: Vec<String> = RE_TECHNIQUE
        .captures_iter(output)
        .map(|c| c[1].to_string())
        .collect();
    let payloads: Vec<String> = RE_PAYLOAD
        .captures_iter(output)
        .map(|c| c[1].to_string())
        .collect();
    let dbms = RE_DBMS.captures(output).map(|c| c[1].to_string());

    let title = match parameters.first() {
        Some(parameter) => format!("SQL injection in parameter {}", parameter),
        None => "SQL injection point identified".to_string(),
    };

    let mut description = format!("Injectable input found at {}.", target);
    if !techniques.is_empty() {
        description.push_str(&format!(" Techniques: {}.", techniques.join(", ")));
    }

    let mut finding = RawFinding::new("sql_injection", title)
        .with_description(description)
        .with_component(target)
        .with_raw_output(serde_json::json!({
            "parameters": parameters,
            "techniques": techniques,
            "payloads": payloads,
            "dbms": dbms,
        }));
    if let Some(dbms) = dbms {
        finding = finding.with_version(dbms);
    }
    Some(finding)
}
