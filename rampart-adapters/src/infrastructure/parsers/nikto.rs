//! Web vulnerability scanner text report parser

use once_cell::sync::Lazy;
use regex::Regex;
use rampart_core::domain::RawFinding;

static RE_CVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,}\b").expect("valid CVE regex"));

static RE_OSVDB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^OSVDB-(\d+):\s*").expect("valid OSVDB regex"));

/// `/path: message` entries after an optional OSVDB prefix
static RE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/[^\s:]*):\s").expect("valid path regex"));

/// Run metadata that nikto prints with the same `+ ` marker
static RE_METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(target ip|target hostname|target port|start time|end time|ssl info|root page|platform):|host\(s\) tested|item\(s\) reported|no web server found|^\d+ requests:",
    )
    .expect("valid metadata regex")
});

const MARKER: &str = "+ ";

/// Parse line-oriented output into one finding per `+ ` line.
///
/// Banner lines (`+ Server: ...`) become information disclosure findings;
/// run metadata lines are skipped.
pub fn parse_nikto_output(output: &str, target: &str) -> Vec<RawFinding> {
    output
        .lines()
        .filter_map(|line| line.trim_end().strip_prefix(MARKER))
        .map(str::trim)
        .filter(|message| !message.is_empty() && !RE_METADATA.is_match(message))
        .map(|message| finding_from_line(message, target))
        .collect()
}

fn finding_from_line(message: &str, target: &str) -> RawFinding {
    let osvdb = RE_OSVDB
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let body = RE_OSVDB.replace(message, "");
    let path = RE_PATH
        .captures(&body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let title = match message.strip_prefix("Server:") {
        Some(banner) => format!("Server banner disclosed: {}", banner.trim()),
        None => message.to_string(),
    };

    let mut finding = RawFinding::new("web_vulnerability", title)
        .with_description(message)
        .with_component(path.clone().unwrap_or_else(|| target.to_string()))
        .with_raw_output(serde_json::json!({
            "line": format!("{}{}", MARKER, message),
            "osvdb": osvdb,
            "path": path,
        }));

    if let Some(cve) = RE_CVE.find(message) {
        finding = finding.with_cve(cve.as_str().to_uppercase());
    }
    finding
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
- Nikto v2.1.6
---------------------------------------------------------------------------
+ Target IP:          93.184.216.34
+ Target Hostname:    example.com
+ Target Port:        80
+ Start Time:         2024-01-01 10:00:00 (GMT0)
---------------------------------------------------------------------------
+ Server: Apache/2.2.8
+ The anti-clickjacking X-Frame-Options header is not present.
+ OSVDB-3092: /admin/: This might be interesting...
+ Apache/2.2.8 appears to be outdated (current is at least Apache/2.4.54). See CVE-2011-3192.
+ 7915 requests: 0 error(s) and 4 item(s) reported on remote host
+ End Time:           2024-01-01 10:05:00 (GMT0) (300 seconds)
---------------------------------------------------------------------------
+ 1 host(s) tested
";

    #[test]
    fn test_one_finding_per_marker_line() {
        let findings = parse_nikto_output(REPORT, "example.com");
        let titles: Vec<&str> = findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Server banner disclosed: Apache/2.2.8",
                "The anti-clickjacking X-Frame-Options header is not present.",
                "OSVDB-3092: /admin/: This might be interesting...",
                "Apache/2.2.8 appears to be outdated (current is at least Apache/2.4.54). See CVE-2011-3192.",
            ]
        );
        assert!(findings.iter().all(|f| f.vulnerability_type == "web_vulnerability"));
    }

    #[test]
    fn test_extracts_cve_osvdb_and_path() {
        let findings = parse_nikto_output(REPORT, "example.com");

        assert_eq!(findings[3].cve_id.as_deref(), Some("CVE-2011-3192"));
        assert!(findings[0].cve_id.is_none());

        assert_eq!(findings[2].raw_output["osvdb"], "3092");
        assert_eq!(findings[2].affected_component.as_deref(), Some("/admin/"));
        assert_eq!(findings[1].affected_component.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_lowercase_cve_is_normalized() {
        let findings = parse_nikto_output("+ /cgi-bin/test: vulnerable, cve-2014-6271\n", "t");
        assert_eq!(findings[0].cve_id.as_deref(), Some("CVE-2014-6271"));
        assert_eq!(findings[0].affected_component.as_deref(), Some("/cgi-bin/test"));
    }

    #[test]
    fn test_output_without_markers() {
        assert!(parse_nikto_output("- Nikto v2.1.6\n+ \n", "example.com").is_empty());
    }
}
