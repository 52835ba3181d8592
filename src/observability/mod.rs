//! Structured logging initialization.
//!
//! Installs a process-wide `tracing` subscriber with an env-driven filter.
//! Output format defaults to human-readable lines and can be switched to
//! JSON for log aggregation pipelines.

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info";
const FORMAT_ENV: &str = "VERIDEX_LOG_FORMAT";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var(FORMAT_ENV).as_deref() {
            Ok(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive string, `RUST_LOG` syntax.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Builds logging configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let filter =
            std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        Self {
            filter,
            format: LogFormat::from_env(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Initializes logging for the process.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if logging has already been
/// initialized or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(already_initialized());
    }

    let filter = EnvFilter::try_new(&config.filter).map_err(|err| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: format!("invalid filter directive '{}': {err}", config.filter),
    })?;

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
                .map_err(|err| init_error(&err))?;
        },
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .with(filter)
                .try_init()
                .map_err(|err| init_error(&err))?;
        },
    }

    LOGGING_INIT.set(()).map_err(|()| already_initialized())
}

/// Initializes logging from environment variables.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if logging has already been
/// initialized.
pub fn init_logging_from_env() -> Result<()> {
    init_logging(&LoggingConfig::from_env())
}

fn already_initialized() -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: "logging already initialized".to_string(),
    }
}

fn init_error(err: &dyn std::error::Error) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: err.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_info_filter() {
        let config = LoggingConfig::default();

        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_filter_directive_is_rejected() {
        let config = LoggingConfig {
            filter: "not==valid==".to_string(),
            format: LogFormat::Pretty,
        };

        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }
}
