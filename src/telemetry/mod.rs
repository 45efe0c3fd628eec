//! Tracing subscriber setup.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RUST_LOG` | Filter directive, wins over the configured level | unset |
//! | `REDISQ_TELEMETRY__LOG_LEVEL` | Default filter directive | `info` |
//! | `REDISQ_TELEMETRY__LOG_FORMAT` | `text` or `json` | `text` |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry-specific error type
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
    #[error("Failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> TelemetryResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> TelemetryResult<()> {
    let format = LogFormat::parse(&config.log_format)?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Install(e.to_string()))?;

    tracing::info!(format = ?format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!(LogFormat::parse("text").unwrap(), LogFormat::Text);
        assert_eq!(LogFormat::parse("JSON").unwrap(), LogFormat::Json);
        assert!(matches!(
            LogFormat::parse("xml"),
            Err(TelemetryError::UnknownFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn test_unknown_format_rejected_before_install() {
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
            log_format: "yaml".to_string(),
        };
        assert!(init_tracing(&config).is_err());
    }
}
