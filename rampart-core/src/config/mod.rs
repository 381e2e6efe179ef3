//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::scan::Tool;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub adapters: AdaptersConfig,
    pub orchestrator: OrchestratorConfig,
    pub reconciliation: ReconciliationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format: "json", "pretty" or "compact"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL (`sqlite://rampart.db`, `sqlite::memory:`)
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://rampart.db".to_string(),
            max_connections: 5,
            connect_timeout_seconds: 10,
            run_migrations: true,
        }
    }
}

/// Job queue and worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of jobs that may be active at the same time
    pub concurrency: usize,
    /// Total attempts per job, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further failure
    pub backoff_base_ms: u64,
    /// Completed jobs retained for audit
    pub keep_completed: usize,
    /// Failed jobs retained for audit
    pub keep_failed: usize,
    /// Priority used when the submitter does not pass one (lower runs first)
    pub default_priority: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_attempts: 3,
            backoff_base_ms: 2_000,
            keep_completed: 10,
            keep_failed: 5,
            default_priority: 10,
        }
    }
}

impl QueueConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// What an adapter does when its external tool fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Return the tool's fixed synthetic finding set
    #[default]
    Permissive,
    /// Surface the failure to the job retry layer
    Strict,
}

impl std::fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permissive => write!(f, "permissive"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Invocation settings for one external tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Executable name or absolute path
    pub binary: String,
    /// Hard limit for one invocation
    pub timeout_seconds: u64,
    /// Arguments placed right after the binary, ahead of the tool arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ToolConfig {
    pub fn new(binary: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_seconds,
            extra_args: Vec::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Tool adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    pub fallback_mode: FallbackMode,
    pub port_scanner: ToolConfig,
    pub web_vuln_scanner: ToolConfig,
    pub sql_injection_tester: ToolConfig,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            fallback_mode: FallbackMode::default(),
            port_scanner: ToolConfig::new("nmap", 5 * 60),
            web_vuln_scanner: ToolConfig::new("nikto", 10 * 60),
            sql_injection_tester: ToolConfig::new("sqlmap", 15 * 60),
        }
    }
}

impl AdaptersConfig {
    /// Process settings for tools backed by a real executable
    pub fn tool(&self, tool: Tool) -> Option<&ToolConfig> {
        match tool {
            Tool::PortScanner => Some(&self.port_scanner),
            Tool::WebVulnScanner => Some(&self.web_vuln_scanner),
            Tool::SqlInjectionTester => Some(&self.sql_injection_tester),
            Tool::WebAppScanner => None,
        }
    }
}

/// Scan executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Raw findings classified concurrently within one adapter stage
    pub classification_concurrency: usize,
    /// How long shutdown waits for in-flight jobs before giving up
    pub shutdown_timeout_seconds: u64,
}

impl OrchestratorConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            classification_concurrency: 4,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Sweep that recovers scans stuck in RUNNING
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// A running scan whose claim is older than this and has no queued job is re-enqueued
    pub stale_after_seconds: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 5 * 60,
            stale_after_seconds: 45 * 60,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("RAMPART")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Config = builder.build()?.try_deserialize()?;

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            config.database.url = database_url;
        }

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
