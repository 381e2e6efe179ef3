//! Risk profiles and the ordered rules that select them

use rampart_core::domain::RawFinding;

/// Scoring baseline and remediation text for one class of finding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub base_score: f64,
    pub description: &'static str,
    pub fix_suggestions: &'static [&'static str],
    pub references: &'static [&'static str],
}

/// How a rule recognizes a raw finding
#[derive(Debug, Clone, Copy)]
pub enum RuleMatcher {
    /// Case-insensitive substring of `vulnerability_type`
    TypeContains(&'static [&'static str]),
    /// Case-insensitive substring of `vulnerability_type` or `title`
    TypeOrTitleContains(&'static [&'static str]),
    /// Exact (normalized) service name
    Service(&'static [&'static str]),
    Port(&'static [u16]),
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileRule {
    pub matcher: RuleMatcher,
    pub profile: &'static RiskProfile,
}

impl ProfileRule {
    fn matches(&self, finding: &NormalizedFinding) -> bool {
        match self.matcher {
            RuleMatcher::TypeContains(needles) => {
                needles.iter().any(|n| finding.vulnerability_type.contains(n))
            }
            RuleMatcher::TypeOrTitleContains(needles) => needles
                .iter()
                .any(|n| finding.vulnerability_type.contains(n) || finding.title.contains(n)),
            RuleMatcher::Service(names) => finding
                .service
                .as_deref()
                .is_some_and(|service| names.contains(&service)),
            RuleMatcher::Port(ports) => finding.port.is_some_and(|port| ports.contains(&port)),
        }
    }
}

/// Lower-cased view of the fields rules look at
pub(crate) struct NormalizedFinding {
    pub vulnerability_type: String,
    pub title: String,
    pub service: Option<String>,
    pub port: Option<u16>,
}

impl NormalizedFinding {
    pub fn new(raw: &RawFinding) -> Self {
        Self {
            vulnerability_type: raw.vulnerability_type.trim().to_lowercase(),
            title: raw.title.trim().to_lowercase(),
            service: raw
                .service
                .as_deref()
                .map(normalize_service)
                .filter(|s| !s.is_empty()),
            port: raw.port,
        }
    }
}

/// Map tool-specific service spellings onto the names rules use.
pub fn normalize_service(service: &str) -> String {
    let service = service.trim().to_lowercase();
    match service.as_str() {
        "ms-sql-s" | "ms-sql" | "sqlserver" => "mssql".to_string(),
        "postgres" => "postgresql".to_string(),
        "ms-wbt-server" => "rdp".to_string(),
        "microsoft-ds" | "netbios-ssn" | "cifs" => "smb".to_string(),
        _ => service,
    }
}

pub static SQL_INJECTION: RiskProfile = RiskProfile {
    id: "sql_injection",
    name: "SQL Injection",
    base_score: 9.8,
    description: "User-controlled input reaches a SQL query without proper parameterization, \
        allowing an attacker to read or modify database contents.",
    fix_suggestions: &[
        "Use parameterized queries or prepared statements for every database access",
        "Validate and constrain user input on the server side",
        "Run the application database account with least privilege",
    ],
    references: &[
        "https://owasp.org/www-community/attacks/SQL_Injection",
        "https://cwe.mitre.org/data/definitions/89.html",
    ],
};

pub static COMMAND_INJECTION: RiskProfile = RiskProfile {
    id: "command_injection",
    name: "Command Injection",
    base_score: 9.8,
    description: "Input is passed to a system shell or interpreter, allowing execution of \
        arbitrary commands on the host.",
    fix_suggestions: &[
        "Avoid invoking shell commands with user-controlled input",
        "Use allowlists for any arguments that must be passed to external programs",
    ],
    references: &[
        "https://owasp.org/www-community/attacks/Command_Injection",
        "https://cwe.mitre.org/data/definitions/78.html",
    ],
};

pub static CROSS_SITE_SCRIPTING: RiskProfile = RiskProfile {
    id: "cross_site_scripting",
    name: "Cross-Site Scripting",
    base_score: 6.1,
    description: "Untrusted data is rendered in pages without encoding, allowing script \
        injection into other users' browsers.",
    fix_suggestions: &[
        "Encode output according to its HTML, attribute or JavaScript context",
        "Deploy a restrictive Content-Security-Policy",
    ],
    references: &[
        "https://owasp.org/www-community/attacks/xss/",
        "https://cwe.mitre.org/data/definitions/79.html",
    ],
};

pub static CSRF: RiskProfile = RiskProfile {
    id: "csrf",
    name: "Cross-Site Request Forgery",
    base_score: 4.3,
    description: "State-changing requests are accepted without proof that they originate \
        from the application itself.",
    fix_suggestions: &[
        "Require anti-CSRF tokens on state-changing requests",
        "Set SameSite on session cookies",
    ],
    references: &[
        "https://owasp.org/www-community/attacks/csrf",
        "https://cwe.mitre.org/data/definitions/352.html",
    ],
};

pub static DIRECTORY_LISTING: RiskProfile = RiskProfile {
    id: "directory_listing",
    name: "Directory Listing",
    base_score: 5.3,
    description: "The web server lists directory contents, exposing files that were not \
        meant to be browsed.",
    fix_suggestions: &["Disable automatic directory indexing in the web server configuration"],
    references: &["https://cwe.mitre.org/data/definitions/548.html"],
};

pub static OUTDATED_SOFTWARE: RiskProfile = RiskProfile {
    id: "outdated_software",
    name: "Outdated Software",
    base_score: 5.9,
    description: "The service runs a software release that is no longer current and may \
        carry publicly known vulnerabilities.",
    fix_suggestions: &[
        "Upgrade to the latest supported release",
        "Subscribe to the vendor's security advisories",
    ],
    references: &["https://owasp.org/Top10/A06_2021-Vulnerable_and_Outdated_Components/"],
};

pub static MISSING_SECURITY_HEADERS: RiskProfile = RiskProfile {
    id: "missing_security_headers",
    name: "Missing Security Headers",
    base_score: 3.7,
    description: "HTTP responses lack one or more hardening headers that browsers rely on \
        to mitigate common attacks.",
    fix_suggestions: &[
        "Add X-Frame-Options, X-Content-Type-Options and Strict-Transport-Security headers",
        "Define a Content-Security-Policy for all HTML responses",
    ],
    references: &["https://owasp.org/www-project-secure-headers/"],
};

pub static INFORMATION_DISCLOSURE: RiskProfile = RiskProfile {
    id: "information_disclosure",
    name: "Information Disclosure",
    base_score: 3.1,
    description: "The target reveals implementation details such as software banners or \
        internal paths that help an attacker plan further steps.",
    fix_suggestions: &["Suppress version banners and verbose error output"],
    references: &["https://cwe.mitre.org/data/definitions/200.html"],
};

pub static SSH_SERVICE: RiskProfile = RiskProfile {
    id: "ssh_exposed",
    name: "Exposed SSH Service",
    base_score: 5.3,
    description: "An SSH service is reachable and can be targeted by credential guessing.",
    fix_suggestions: &[
        "Disable password authentication and require keys",
        "Limit SSH access to trusted networks",
    ],
    references: &["https://www.ssh.com/academy/ssh/security"],
};

pub static TELNET_SERVICE: RiskProfile = RiskProfile {
    id: "telnet_exposed",
    name: "Exposed Telnet Service",
    base_score: 6.5,
    description: "Telnet transmits credentials and session data in cleartext.",
    fix_suggestions: &["Disable telnet and use SSH instead"],
    references: &["https://cwe.mitre.org/data/definitions/319.html"],
};

pub static FTP_SERVICE: RiskProfile = RiskProfile {
    id: "ftp_exposed",
    name: "Exposed FTP Service",
    base_score: 5.3,
    description: "FTP transmits credentials in cleartext and often permits anonymous access.",
    fix_suggestions: &[
        "Replace FTP with SFTP or FTPS",
        "Disable anonymous login",
    ],
    references: &["https://cwe.mitre.org/data/definitions/319.html"],
};

pub static RDP_SERVICE: RiskProfile = RiskProfile {
    id: "rdp_exposed",
    name: "Exposed Remote Desktop",
    base_score: 6.0,
    description: "A remote desktop service is reachable and is a frequent target of \
        brute-force and pre-authentication exploits.",
    fix_suggestions: &[
        "Place remote desktop behind a VPN or gateway",
        "Enforce network level authentication",
    ],
    references: &["https://www.cisa.gov/news-events/news/remote-desktop-protocol-security"],
};

pub static DATABASE_SERVICE: RiskProfile = RiskProfile {
    id: "database_exposed",
    name: "Exposed Database Service",
    base_score: 6.5,
    description: "A database server accepts connections from the scanned network.",
    fix_suggestions: &[
        "Bind the database to internal interfaces only",
        "Require strong authentication and encrypted connections",
    ],
    references: &["https://owasp.org/www-project-database-security/"],
};

pub static SMB_SERVICE: RiskProfile = RiskProfile {
    id: "smb_exposed",
    name: "Exposed SMB Service",
    base_score: 6.8,
    description: "File sharing over SMB is reachable and has a long history of wormable \
        vulnerabilities.",
    fix_suggestions: &[
        "Block SMB at the network perimeter",
        "Disable SMBv1",
    ],
    references: &["https://www.cisa.gov/news-events/alerts/2017/01/16/smb-security-best-practices"],
};

/// Profile used when no rule matches
pub static OPEN_PORT: RiskProfile = RiskProfile {
    id: "open_port",
    name: "Open Port",
    base_score: 0.0,
    description: "An open network port was observed. No specific risk is associated with \
        the detected service.",
    fix_suggestions: &["Close the port if the service is not required"],
    references: &[],
};

/// Rules in evaluation order: type/title keywords, then services, then ports.
pub static RULES: &[ProfileRule] = &[
    // Vulnerability type and title
    ProfileRule {
        matcher: RuleMatcher::TypeContains(&["sql"]),
        profile: &SQL_INJECTION,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&[
            "command injection",
            "command_injection",
            "remote code execution",
            "os command",
        ]),
        profile: &COMMAND_INJECTION,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&[
            "xss",
            "cross-site scripting",
            "cross site scripting",
        ]),
        profile: &CROSS_SITE_SCRIPTING,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&["csrf", "cross-site request forgery"]),
        profile: &CSRF,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&["directory listing", "directory indexing"]),
        profile: &DIRECTORY_LISTING,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&["outdated", "end-of-life", "end of life"]),
        profile: &OUTDATED_SOFTWARE,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&[
            "missing security header",
            "x-frame-options",
            "x-content-type-options",
            "strict-transport-security",
            "content-security-policy",
            "httponly",
        ]),
        profile: &MISSING_SECURITY_HEADERS,
    },
    ProfileRule {
        matcher: RuleMatcher::TypeOrTitleContains(&[
            "information disclosure",
            "disclosure",
            "banner",
            "leaks",
        ]),
        profile: &INFORMATION_DISCLOSURE,
    },
    // Service names
    ProfileRule {
        matcher: RuleMatcher::Service(&["ssh"]),
        profile: &SSH_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Service(&["telnet"]),
        profile: &TELNET_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Service(&["ftp"]),
        profile: &FTP_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Service(&["rdp"]),
        profile: &RDP_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Service(&["mysql", "postgresql", "mssql"]),
        profile: &DATABASE_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Service(&["smb"]),
        profile: &SMB_SERVICE,
    },
    // Well-known ports
    ProfileRule {
        matcher: RuleMatcher::Port(&[22]),
        profile: &SSH_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Port(&[23]),
        profile: &TELNET_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Port(&[21]),
        profile: &FTP_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Port(&[3389]),
        profile: &RDP_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Port(&[3306, 5432, 1433]),
        profile: &DATABASE_SERVICE,
    },
    ProfileRule {
        matcher: RuleMatcher::Port(&[445]),
        profile: &SMB_SERVICE,
    },
];

/// First profile whose rule matches, or [`OPEN_PORT`].
pub fn select_profile(raw: &RawFinding) -> &'static RiskProfile {
    select_normalized(&NormalizedFinding::new(raw))
}

pub(crate) fn select_normalized(finding: &NormalizedFinding) -> &'static RiskProfile {
    RULES
        .iter()
        .find(|rule| rule.matches(finding))
        .map(|rule| rule.profile)
        .unwrap_or(&OPEN_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_rules_take_precedence_over_services() {
        let raw = RawFinding::new("sql_injection", "Injectable parameter")
            .with_port(3306)
            .with_service("mysql");
        assert_eq!(select_profile(&raw).id, "sql_injection");
    }

    #[test]
    fn test_sql_rule_checks_type_not_title() {
        let raw = RawFinding::new("open_port", "Open port 3306/tcp (mysql)")
            .with_port(3306)
            .with_service("mysql");
        assert_eq!(select_profile(&raw).id, "database_exposed");
    }

    #[test]
    fn test_service_rule_before_port_rule() {
        let raw = RawFinding::new("open_port", "Open port 22/tcp")
            .with_port(22)
            .with_service("telnet");
        assert_eq!(select_profile(&raw).id, "telnet_exposed");
    }

    #[test]
    fn test_port_rule_without_service() {
        let raw = RawFinding::new("open_port", "Open port 445/tcp").with_port(445);
        assert_eq!(select_profile(&raw).id, "smb_exposed");
    }

    #[test]
    fn test_nmap_service_aliases() {
        assert_eq!(normalize_service("ms-sql-s"), "mssql");
        assert_eq!(normalize_service(" Microsoft-DS "), "smb");
        let raw = RawFinding::new("open_port", "Open port 1434/tcp").with_service("ms-sql-s");
        assert_eq!(select_profile(&raw).id, "database_exposed");
    }

    #[test]
    fn test_default_profile() {
        let raw = RawFinding::new("open_port", "Open port 80/tcp")
            .with_port(80)
            .with_service("http");
        assert_eq!(select_profile(&raw).id, "open_port");
        assert_eq!(select_profile(&raw).base_score, 0.0);
    }

    #[test]
    fn test_header_keyword_in_title() {
        let raw = RawFinding::new(
            "web_vulnerability",
            "The anti-clickjacking X-Frame-Options header is not present.",
        );
        assert_eq!(select_profile(&raw).id, "missing_security_headers");
    }
}
