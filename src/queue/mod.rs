//! Reliable log queue backed by a remote list store.
//!
//! Messages pushed by the producer are appended to a Redis list. The consumer
//! pops them from the head; with the backlog enabled each popped message is
//! kept in memory until the consumer either acks it (final commit) or rewinds
//! it (re-appended to the list for redelivery).
//!
//! # Delivery guarantee
//!
//! At-least-once. A message is buffered in the backlog before it is removed
//! from the list, so a crash or a failed remove between the two steps can
//! deliver it twice but never loses it.
//!
//! # Store layout
//!
//! Each message occupies [`STORE_SLOTS_PER_MESSAGE`] consecutive list slots:
//! the serialized message followed by its path options.

mod backlog;
mod factory;
mod redis_queue;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::message::{LogMessage, PathOptions};
use crate::store::StoreError;

pub use backlog::{Backlog, BacklogEntry};
pub use factory::{create_queue_with_connector, create_redis_queue};
pub use redis_queue::RedisQueue;

/// List slots used by one logical message: payload and path options.
pub const STORE_SLOTS_PER_MESSAGE: usize = 2;

/// Ordering discipline reported by [`RedisQueue::queue_type`].
pub const QUEUE_TYPE: &str = "FIFO";

/// Errors that can occur while setting up a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The store did not answer when the queue was created
    #[error("No connection to the store for queue {key}")]
    NotConnected { key: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Producer/consumer contract of a log queue.
///
/// Individual operations never return errors: failures are logged and
/// counted, and the affected message is dropped or redelivered as documented
/// on each method.
#[async_trait]
pub trait LogQueue: Send + Sync {
    /// Messages currently waiting in the store. 0 when the store is down.
    async fn get_length(&self) -> usize;

    /// Append a message. Acks it to its producer on success; on failure the
    /// message is dropped and counted.
    async fn push_tail(&self, msg: &LogMessage, path_options: &PathOptions);

    /// Take the oldest message, or `None` if there is none.
    async fn pop_head(&self, path_options: &mut PathOptions) -> Option<Arc<LogMessage>>;

    /// Permanently release up to `count` of the oldest backlog entries.
    /// Returns how many were released.
    fn ack_backlog(&self, count: usize) -> usize;

    /// Return up to `count` of the oldest backlog entries to the store.
    /// Returns how many left the backlog.
    async fn rewind_backlog(&self, count: usize) -> usize;

    /// Return the whole backlog to the store.
    async fn rewind_backlog_all(&self) -> usize {
        self.rewind_backlog(usize::MAX).await
    }

    /// Drop whatever is left in the backlog. Safe to call more than once.
    fn free(&self);
}

/// Point-in-time view of a queue's bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue_name: String,
    pub use_backlog: bool,
    pub backlog_len: usize,
    pub queued_messages: i64,
    pub memory_usage: i64,
    pub dropped_messages: u64,
}
