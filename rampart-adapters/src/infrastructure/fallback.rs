//! Synthetic finding sets and the permissive/strict failure policy

use rampart_core::config::FallbackMode;
use rampart_core::domain::{RawFinding, Tool};
use tracing::warn;

use crate::domain::{AdapterError, AdapterRun};

fn synthetic(target: &str, details: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "synthetic": true,
        "target": target,
        "details": details,
    })
}

/// Fixed result set returned for a tool that produced no usable output.
///
/// Every finding carries `"synthetic": true` in its raw output. The SQL
/// injection tester's set is empty, so callers learn about its fallback
/// from [`AdapterRun::fell_back`] alone.
pub fn synthetic_findings(tool: Tool, target: &str) -> Vec<RawFinding> {
    match tool {
        Tool::PortScanner => [(22u16, "ssh"), (80, "http"), (443, "https")]
            .into_iter()
            .map(|(port, service)| {
                RawFinding::new("open_port", format!("Open port {}/tcp ({})", port, service))
                    .with_port(port)
                    .with_protocol("tcp")
                    .with_service(service)
                    .with_component(target)
                    .with_raw_output(synthetic(
                        target,
                        serde_json::json!({"port": port, "protocol": "tcp", "service": service}),
                    ))
            })
            .collect(),
        Tool::WebVulnScanner => vec![
            RawFinding::new(
                "web_vulnerability",
                "The anti-clickjacking X-Frame-Options header is not present.",
            )
            .with_component(target)
            .with_raw_output(synthetic(target, serde_json::json!({"header": "X-Frame-Options"}))),
            RawFinding::new("web_vulnerability", "Server banner disclosed: Apache")
                .with_component(target)
                .with_raw_output(synthetic(target, serde_json::json!({"header": "Server"}))),
        ],
        Tool::SqlInjectionTester => Vec::new(),
        Tool::WebAppScanner => vec![
            RawFinding::new("web_vulnerability", "Content-Security-Policy header not set")
                .with_description("No Content-Security-Policy header was returned by the application.")
                .with_component(target)
                .with_raw_output(synthetic(
                    target,
                    serde_json::json!({"header": "Content-Security-Policy"}),
                )),
            RawFinding::new("web_vulnerability", "Cookie without HttpOnly flag")
                .with_description("A session cookie is set without the HttpOnly attribute.")
                .with_component(target)
                .with_raw_output(synthetic(target, serde_json::json!({"cookie": "session"}))),
            RawFinding::new("web_vulnerability", "X-Content-Type-Options header missing")
                .with_component(target)
                .with_raw_output(synthetic(
                    target,
                    serde_json::json!({"header": "X-Content-Type-Options"}),
                )),
        ],
    }
}

/// Apply the fallback policy to the result of one tool run.
///
/// Permissive mode replaces every failure with the synthetic set. Strict
/// mode surfaces process failures and turns parse failures into an empty
/// result. Both replacements are reported as fallen back.
pub fn apply_fallback(
    tool: Tool,
    mode: FallbackMode,
    target: &str,
    result: Result<Vec<RawFinding>, AdapterError>,
) -> Result<AdapterRun, AdapterError> {
    let error = match result {
        Ok(findings) => return Ok(AdapterRun::live(findings)),
        Err(error) => error,
    };

    match mode {
        FallbackMode::Permissive => {
            warn!(
                tool = %tool,
                target = %target,
                error = %error,
                "Tool failed, returning synthetic findings"
            );
            Ok(AdapterRun::fallback(synthetic_findings(tool, target)))
        }
        FallbackMode::Strict if error.is_transient() => Err(error),
        FallbackMode::Strict => {
            warn!(
                tool = %tool,
                target = %target,
                error = %error,
                "Unparseable tool output, returning no findings"
            );
            Ok(AdapterRun::fallback(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn timeout() -> AdapterError {
        AdapterError::Timeout {
            binary: "nmap".to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_synthetic_sets_are_tagged() {
        for tool in [
            Tool::PortScanner,
            Tool::WebVulnScanner,
            Tool::SqlInjectionTester,
            Tool::WebAppScanner,
        ] {
            for finding in synthetic_findings(tool, "example.com") {
                assert_eq!(finding.raw_output["synthetic"], true, "{tool}");
            }
        }
        assert_eq!(synthetic_findings(Tool::PortScanner, "example.com").len(), 3);
        assert!(synthetic_findings(Tool::SqlInjectionTester, "example.com").is_empty());
    }

    #[test]
    fn test_synthetic_sets_are_deterministic() {
        assert_eq!(
            synthetic_findings(Tool::WebAppScanner, "example.com"),
            synthetic_findings(Tool::WebAppScanner, "example.com")
        );
    }

    #[test]
    fn test_permissive_replaces_failures() {
        let run = apply_fallback(
            Tool::PortScanner,
            FallbackMode::Permissive,
            "example.com",
            Err(timeout()),
        )
        .unwrap();
        assert!(run.fell_back);
        assert_eq!(run.findings.len(), 3);

        let parsed = apply_fallback(
            Tool::PortScanner,
            FallbackMode::Permissive,
            "example.com",
            Err(AdapterError::parse(Tool::PortScanner, "bad xml")),
        )
        .unwrap();
        assert!(parsed.fell_back);
        assert_eq!(parsed.findings.len(), 3);
    }

    #[test]
    fn test_empty_synthetic_set_still_reports_fallback() {
        let run = apply_fallback(
            Tool::SqlInjectionTester,
            FallbackMode::Permissive,
            "http://example.com/?id=1",
            Err(AdapterError::Spawn {
                binary: "sqlmap".to_string(),
                message: "No such file or directory".to_string(),
            }),
        )
        .unwrap();
        assert_eq!(run, AdapterRun::fallback(Vec::new()));
    }

    #[test]
    fn test_strict_surfaces_process_failures_only() {
        let err = apply_fallback(
            Tool::PortScanner,
            FallbackMode::Strict,
            "example.com",
            Err(timeout()),
        )
        .unwrap_err();
        assert_eq!(err, timeout());

        let parsed = apply_fallback(
            Tool::PortScanner,
            FallbackMode::Strict,
            "example.com",
            Err(AdapterError::parse(Tool::PortScanner, "bad xml")),
        )
        .unwrap();
        assert!(parsed.fell_back);
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_success_passes_through() {
        let findings = vec![RawFinding::new("open_port", "Open port 8080/tcp")];
        let result = apply_fallback(
            Tool::PortScanner,
            FallbackMode::Strict,
            "example.com",
            Ok(findings.clone()),
        );
        assert_eq!(result, Ok(AdapterRun::live(findings)));
    }
}
