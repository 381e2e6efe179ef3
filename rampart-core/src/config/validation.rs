//! Configuration validation module

use crate::config::{
    AdaptersConfig, Config, DatabaseConfig, LoggingConfig, OrchestratorConfig,
    QueueConfig, ReconciliationConfig, ToolConfig,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Logging configuration error: {message}")]
    Logging { message: String },

    #[error("Database configuration error: {message}")]
    Database { message: String },

    #[error("Queue configuration error: {message}")]
    Queue { message: String },

    #[error("Adapter configuration error: {message}")]
    Adapters { message: String },

    #[error("Orchestrator configuration error: {message}")]
    Orchestrator { message: String },

    #[error("Reconciliation configuration error: {message}")]
    Reconciliation { message: String },
}

impl ValidationError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    pub fn adapters(message: impl Into<String>) -> Self {
        Self::Adapters {
            message: message.into(),
        }
    }

    pub fn orchestrator(message: impl Into<String>) -> Self {
        Self::Orchestrator {
            message: message.into(),
        }
    }

    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::Reconciliation {
            message: message.into(),
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.level.trim().is_empty() {
            return Err(ValidationError::logging("Log level cannot be empty"));
        }

        match self.format.as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "Log format must be one of json, pretty, compact; got: {}",
                other
            ))),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.url.starts_with("sqlite:") {
            return Err(ValidationError::database(format!(
                "Database url must start with sqlite:, got: {}",
                self.url
            )));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::database(
                "max_connections must be greater than 0",
            ));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(ValidationError::database(
                "connect_timeout_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::queue("concurrency must be greater than 0"));
        }

        if self.max_attempts == 0 {
            return Err(ValidationError::queue("max_attempts must be at least 1"));
        }

        // 2^31 doublings overflow any sensible delay
        if self.max_attempts > 31 {
            return Err(ValidationError::queue(format!(
                "max_attempts must be at most 31, got {}",
                self.max_attempts
            )));
        }

        Ok(())
    }
}

fn validate_tool(name: &str, tool: &ToolConfig) -> Result<(), ValidationError> {
    if tool.binary.trim().is_empty() {
        return Err(ValidationError::adapters(format!(
            "{} binary cannot be empty",
            name
        )));
    }

    if tool.timeout_seconds == 0 {
        return Err(ValidationError::adapters(format!(
            "{} timeout must be greater than 0 seconds",
            name
        )));
    }

    Ok(())
}

impl Validate for AdaptersConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_tool("port_scanner", &self.port_scanner)?;
        validate_tool("web_vuln_scanner", &self.web_vuln_scanner)?;
        validate_tool("sql_injection_tester", &self.sql_injection_tester)?;
        Ok(())
    }
}

impl Validate for OrchestratorConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.classification_concurrency == 0 {
            return Err(ValidationError::orchestrator(
                "classification_concurrency must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for ReconciliationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }

        if self.interval_seconds == 0 {
            return Err(ValidationError::reconciliation(
                "interval_seconds must be greater than 0",
            ));
        }

        if self.stale_after_seconds == 0 {
            return Err(ValidationError::reconciliation(
                "stale_after_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.logging.validate()?;
        self.database.validate()?;
        self.queue.validate()?;
        self.adapters.validate()?;
        self.orchestrator.validate()?;
        self.reconciliation.validate()?;

        // A stale threshold below the slowest combined run would re-enqueue healthy scans
        if self.reconciliation.enabled {
            let combined_budget = self.adapters.port_scanner.timeout_seconds
                + self.adapters.web_vuln_scanner.timeout_seconds
                + self.adapters.sql_injection_tester.timeout_seconds;
            if self.reconciliation.stale_after_seconds < combined_budget {
                return Err(ValidationError::reconciliation(format!(
                    "stale_after_seconds ({}) must cover the combined adapter timeouts ({})",
                    self.reconciliation.stale_after_seconds, combined_budget
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.queue.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Queue { .. })
        ));
    }

    #[test]
    fn test_non_sqlite_url_rejected() {
        let mut config = Config::default();
        config.database.url = "postgres://localhost/rampart".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Database { .. })
        ));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Logging { .. })
        ));
    }

    #[test]
    fn test_stale_threshold_must_cover_adapter_timeouts() {
        let mut config = Config::default();
        config.reconciliation.stale_after_seconds = 60;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Reconciliation { .. })
        ));

        config.reconciliation.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_tool_binary_rejected() {
        let mut config = Config::default();
        config.adapters.web_vuln_scanner.binary = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Adapters { .. })
        ));
    }
}
