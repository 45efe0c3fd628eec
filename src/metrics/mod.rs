//! Prometheus metrics for the Redis-backed queue.
//!
//! This module provides:
//! - Per-queue counters (dropped messages, backlog size, backlog memory)
//! - Store connection metrics (connection status, reconnections, failed commands)
//!
//! Queue metrics are labelled by the queue's Redis key, store metrics by the
//! `host:port` endpoint.

mod helpers;

pub use helpers::{encode_metrics, QueueMetrics, StoreMetrics};

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "redisq";

lazy_static! {
    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Messages lost by the queue (failed push, freed backlog, failed rewind, malformed entry)
    pub static ref QUEUE_DROPPED_MESSAGES: IntCounterVec = register_int_counter_vec!(
        format!("{}_dropped_messages_total", METRIC_PREFIX),
        "Total messages dropped by the queue",
        &["queue"]
    ).unwrap();

    /// Messages delivered to the consumer and waiting for an ack
    pub static ref QUEUE_QUEUED_MESSAGES: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queued_messages", METRIC_PREFIX),
        "Number of messages held in the in-memory backlog",
        &["queue"]
    ).unwrap();

    /// Approximate memory held by backlog messages
    pub static ref QUEUE_MEMORY_USAGE: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_memory_usage_bytes", METRIC_PREFIX),
        "Approximate bytes held by backlog messages",
        &["queue"]
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Store connection status (1 = connected, 0 = disconnected)
    pub static ref STORE_CONNECTED: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_store_connected", METRIC_PREFIX),
        "Redis connection status (1=connected, 0=disconnected)",
        &["endpoint"]
    ).unwrap();

    /// Reconnection attempts made after a failed liveness probe
    pub static ref STORE_RECONNECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_reconnections_total", METRIC_PREFIX),
        "Total Redis reconnection attempts",
        &["endpoint"]
    ).unwrap();

    /// Commands that got no reply or an error reply
    pub static ref STORE_COMMAND_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_command_failures_total", METRIC_PREFIX),
        "Total failed Redis commands",
        &["endpoint"]
    ).unwrap();
}
