//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Errors raised while installing the global subscriber
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when it is set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(&directive)
            .map_err(|e| LoggingError::Filter {
                filter: directive.clone(),
                message: e.to_string(),
            })?,
        _ => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
            filter: config.level.clone(),
            message: e.to_string(),
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format.as_str() {
        "json" => builder.json().with_current_span(true).try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}
