//! Concrete tool adapters

mod port_scanner;
mod sql_injection;
mod web_app;
mod web_vuln;

pub use port_scanner::PortScannerAdapter;
pub use sql_injection::SqlInjectionAdapter;
pub use web_app::WebAppScannerAdapter;
pub use web_vuln::WebVulnScannerAdapter;

use rampart_core::config::ToolConfig;

use crate::infrastructure::process::ToolCommand;

/// Command for `config.binary` with the configured extra arguments first.
fn base_command(config: &ToolConfig) -> ToolCommand {
    ToolCommand::new(&config.binary, config.timeout()).args(config.extra_args.iter().cloned())
}

/// Whether the configured binary resolves, either as a path or on `PATH`
fn binary_available(config: &ToolConfig) -> bool {
    which::which(&config.binary).is_ok()
}

/// Option values are passed as single arguments; reject anything that
/// could be read as a flag or contains whitespace.
fn safe_value(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && !value.starts_with('-') && !value.contains(char::is_whitespace))
        .then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_value() {
        assert_eq!(safe_value(" 1-1024 "), Some("1-1024"));
        assert_eq!(safe_value("--script=evil"), None);
        assert_eq!(safe_value("80 -oN /tmp/x"), None);
        assert_eq!(safe_value(""), None);
    }

    #[test]
    fn test_extra_args_come_first() {
        let mut config = ToolConfig::new("nmap", 30);
        config.extra_args = vec!["-Pn".to_string()];
        let command = base_command(&config).arg("example.com");
        assert_eq!(command.binary(), "nmap");
        assert_eq!(command.get_args(), ["-Pn", "example.com"]);
    }
}
