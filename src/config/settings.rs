use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: RedisQueueConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Connection and naming options for one Redis-backed queue.
///
/// Immutable once a queue has been built from it.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisQueueConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect timeout in seconds
    #[serde(default = "default_conn_timeout")]
    pub conn_timeout: u64,
    /// Password sent with AUTH after connecting
    #[serde(default)]
    pub auth: Option<String>,
    /// Prefix of the list key, joined to the persist name with `_`
    #[serde(default = "default_keyprefix")]
    pub keyprefix: String,
    /// Keep popped messages in memory until they are acked
    #[serde(default = "default_use_backlog")]
    pub use_backlog: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_conn_timeout() -> u64 {
    10 // 10 seconds
}

fn default_keyprefix() -> String {
    "redisq".to_string()
}

fn default_use_backlog() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("redis.host", default_host())?
            .set_default("redis.port", default_port())?
            .set_default("redis.conn_timeout", default_conn_timeout())?
            .set_default("redis.keyprefix", default_keyprefix())?
            .set_default("redis.use_backlog", default_use_backlog())?
            .set_default("telemetry.log_level", default_log_level())?
            .set_default("telemetry.log_format", default_log_format())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // REDISQ_REDIS__HOST, REDISQ_REDIS__AUTH, REDISQ_TELEMETRY__LOG_FORMAT, ...
            .add_source(
                Environment::with_prefix("REDISQ")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl RedisQueueConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.conn_timeout)
    }

    /// Builds the `redis://` URL. The password is never part of it, AUTH is
    /// sent explicitly after connecting.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            conn_timeout: default_conn_timeout(),
            auth: None,
            keyprefix: default_keyprefix(),
            use_backlog: default_use_backlog(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let redis = RedisQueueConfig::default();
        assert_eq!(redis.host, "127.0.0.1");
        assert_eq!(redis.port, 6379);
        assert_eq!(redis.keyprefix, "redisq");
        assert!(redis.auth.is_none());
        assert!(redis.use_backlog);
    }

    #[test]
    fn test_connection_helpers() {
        let redis = RedisQueueConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            conn_timeout: 3,
            auth: Some("secret".to_string()),
            ..Default::default()
        };

        assert_eq!(redis.server_addr(), "cache.internal:6380");
        assert_eq!(redis.url(), "redis://cache.internal:6380/");
        assert_eq!(redis.connect_timeout(), Duration::from_secs(3));
    }
}
