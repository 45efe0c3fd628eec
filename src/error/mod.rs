use thiserror::Error;

use crate::queue::QueueError;
use crate::store::StoreError;
use crate::telemetry::TelemetryError;

/// Top-level error of the `redisq` binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_display() {
        let err: AppError = QueueError::NotConnected {
            key: "redisq_d_file".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Queue error: No connection to the store for queue redisq_d_file"
        );
    }
}
