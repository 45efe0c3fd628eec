mod settings;

pub use settings::{RedisQueueConfig, Settings, TelemetryConfig};
