//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, IntCounter, IntGauge, TextEncoder};

use super::{
    QUEUE_DROPPED_MESSAGES, QUEUE_MEMORY_USAGE, QUEUE_QUEUED_MESSAGES,
    STORE_COMMAND_FAILURES_TOTAL, STORE_CONNECTED, STORE_RECONNECTIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Counters owned by a single queue.
///
/// Holds the label-resolved children so the hot path never hashes the label.
#[derive(Clone)]
pub struct QueueMetrics {
    dropped: IntCounter,
    queued: IntGauge,
    memory: IntGauge,
}

impl QueueMetrics {
    pub fn new(queue: &str) -> Self {
        Self {
            dropped: QUEUE_DROPPED_MESSAGES.with_label_values(&[queue]),
            queued: QUEUE_QUEUED_MESSAGES.with_label_values(&[queue]),
            memory: QUEUE_MEMORY_USAGE.with_label_values(&[queue]),
        }
    }

    pub fn record_dropped(&self) {
        self.dropped.inc();
    }

    /// A message entered the backlog
    pub fn record_buffered(&self, size: usize) {
        self.queued.inc();
        self.memory.add(size as i64);
    }

    /// A message left the backlog (acked, rewound or freed)
    pub fn record_released(&self, size: usize) {
        self.queued.dec();
        self.memory.sub(size as i64);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    pub fn queued(&self) -> i64 {
        self.queued.get()
    }

    pub fn memory_usage(&self) -> i64 {
        self.memory.get()
    }
}

/// Helper struct for recording store connection metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn set_connected(endpoint: &str, connected: bool) {
        STORE_CONNECTED
            .with_label_values(&[endpoint])
            .set(if connected { 1 } else { 0 });
    }

    pub fn record_reconnect(endpoint: &str) {
        STORE_RECONNECTIONS_TOTAL.with_label_values(&[endpoint]).inc();
    }

    pub fn record_command_failure(endpoint: &str) {
        STORE_COMMAND_FAILURES_TOTAL.with_label_values(&[endpoint]).inc();
    }
}
