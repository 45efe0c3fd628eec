use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::message::{
    deserialize_message, deserialize_options, serialize_message, serialize_options, AckType,
    CodecError, LogMessage, PathOptions,
};
use crate::metrics::QueueMetrics;
use crate::store::{RedisServer, StoreCommand};

use super::{
    Backlog, BacklogEntry, LogQueue, QueueError, QueueStats, QUEUE_TYPE, STORE_SLOTS_PER_MESSAGE,
};

/// Result of peeking at the head of the list.
enum ReadOutcome {
    Empty,
    Message(LogMessage, PathOptions),
    Malformed(MalformedHead),
}

/// Undecodable head content and the number of slots to discard so the next
/// read starts on a message boundary again.
#[derive(Debug)]
struct MalformedHead {
    error: CodecError,
    slots: usize,
}

/// Log queue stored in a Redis list under `"<keyprefix>_<persist_name>"`.
///
/// Shared as `Arc<RedisQueue>` between one producer and one consumer.
/// Commands are serialized by the [`RedisServer`]; the backlog lock is only
/// held for in-memory bookkeeping, never across a store round trip.
///
/// # Example
///
/// ```rust,ignore
/// let queue = create_redis_queue(&settings.redis, "d_syslog").await?;
///
/// queue.push_tail(&msg, &PathOptions::default()).await;
///
/// let mut opts = PathOptions::default();
/// if let Some(msg) = queue.pop_head(&mut opts).await {
///     match deliver(&msg).await {
///         Ok(()) => { queue.ack_backlog(1); }
///         Err(_) => { queue.rewind_backlog_all().await; }
///     }
/// }
/// ```
pub struct RedisQueue {
    server: Arc<RedisServer>,
    queue_name: String,
    persist_name: String,
    use_backlog: bool,
    backlog: Mutex<Backlog>,
    data_available: Notify,
    metrics: QueueMetrics,
}

impl RedisQueue {
    /// Create a queue over `server`.
    ///
    /// Fails if the store does not answer a liveness probe.
    pub async fn new(
        server: Arc<RedisServer>,
        persist_name: &str,
        use_backlog: bool,
    ) -> Result<Self, QueueError> {
        let queue_name = queue_key(&server.config().keyprefix, persist_name);
        tracing::debug!(queue = %queue_name, use_backlog, "Creating redis log queue");

        if !server.is_alive().await {
            return Err(QueueError::NotConnected { key: queue_name });
        }

        Ok(Self {
            metrics: QueueMetrics::new(&queue_name),
            server,
            queue_name,
            persist_name: persist_name.to_string(),
            use_backlog,
            backlog: Mutex::new(Backlog::new()),
            data_available: Notify::new(),
        })
    }

    /// The Redis key of the list
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn persist_name(&self) -> &str {
        &self.persist_name
    }

    pub fn queue_type(&self) -> &'static str {
        QUEUE_TYPE
    }

    pub fn server(&self) -> &Arc<RedisServer> {
        &self.server
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog().len()
    }

    /// Wait until a push succeeds.
    ///
    /// A push that happens while nobody waits is remembered, so the next
    /// call returns immediately.
    pub async fn wait_for_data(&self) {
        self.data_available.notified().await;
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queue_name: self.queue_name.clone(),
            use_backlog: self.use_backlog,
            backlog_len: self.backlog_len(),
            queued_messages: self.metrics.queued(),
            memory_usage: self.metrics.memory_usage(),
            dropped_messages: self.metrics.dropped(),
        }
    }

    fn backlog(&self) -> MutexGuard<'_, Backlog> {
        self.backlog.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize and append one message. False if nothing was stored.
    async fn write_message(&self, msg: &LogMessage, path_options: &PathOptions) -> bool {
        if !self.server.is_alive().await {
            return false;
        }

        let values = match (serialize_message(msg), serialize_options(path_options)) {
            (Ok(payload), Ok(marker)) => vec![payload, marker],
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(
                    queue = %self.queue_name,
                    message_id = %msg.id,
                    error = %e,
                    "Failed to serialize log message"
                );
                return false;
            }
        };

        tracing::debug!(
            queue = %self.queue_name,
            message_id = %msg.id,
            len = values[0].len(),
            "Writing msg to redis queue"
        );

        self.server
            .send_command(&StoreCommand::RPush {
                key: self.queue_name.clone(),
                values,
            })
            .await
    }

    async fn read_message(&self) -> ReadOutcome {
        if !self.server.is_alive().await {
            return ReadOutcome::Empty;
        }

        let peek = StoreCommand::LRange {
            key: self.queue_name.clone(),
            start: 0,
            stop: STORE_SLOTS_PER_MESSAGE as isize - 1,
        };
        let Some(reply) = self.server.get_reply(&peek).await else {
            return ReadOutcome::Empty;
        };

        match reply.into_items() {
            Some(items) if items.is_empty() => ReadOutcome::Empty,
            Some(items) => {
                tracing::debug!(queue = %self.queue_name, "Got msg from redis server");
                match decode_slots(&items) {
                    Ok((msg, path_options)) => ReadOutcome::Message(msg, path_options),
                    Err(e) => ReadOutcome::Malformed(e),
                }
            }
            None => {
                tracing::error!(queue = %self.queue_name, "Unexpected reply to LRANGE");
                ReadOutcome::Empty
            }
        }
    }

    /// Remove `slots` entries from the head of the list.
    async fn delete_slots(&self, slots: usize) -> bool {
        if !self.server.is_alive().await {
            return false;
        }

        tracing::debug!(queue = %self.queue_name, slots, "Removing msg from redis queue");
        self.server
            .send_command(&StoreCommand::LPop {
                key: self.queue_name.clone(),
                count: slots,
            })
            .await
    }

    /// Drop every backlog entry without redelivering it.
    fn drop_backlog(&self) -> usize {
        let entries = self.backlog().drain();

        for entry in &entries {
            self.metrics.record_released(entry.message.size());
            self.metrics.record_dropped();
            tracing::warn!(
                queue = %self.queue_name,
                message_id = %entry.message.id,
                "Dropping unacknowledged backlog message, not delivered"
            );
            entry.message.ack(&entry.path_options, AckType::Processed);
        }

        entries.len()
    }
}

#[async_trait]
impl LogQueue for RedisQueue {
    async fn get_length(&self) -> usize {
        let mut len = 0;

        if self.server.is_alive().await {
            let cmd = StoreCommand::LLen {
                key: self.queue_name.clone(),
            };
            match self.server.get_reply(&cmd).await {
                Some(reply) => {
                    if let Some(slots) = reply.as_integer() {
                        len = slots.max(0) as usize / STORE_SLOTS_PER_MESSAGE;
                    }
                }
                None => tracing::error!(queue = %self.queue_name, "Get length redis reply failed"),
            }
        }

        tracing::debug!(queue = %self.queue_name, size = len, "Get length");
        len
    }

    async fn push_tail(&self, msg: &LogMessage, path_options: &PathOptions) {
        tracing::debug!(queue = %self.queue_name, message_id = %msg.id, "Pushing msg to tail");

        if self.write_message(msg, path_options).await {
            self.data_available.notify_one();
            msg.ack(path_options, AckType::Processed);
            return;
        }

        self.metrics.record_dropped();
        tracing::error!(
            queue = %self.queue_name,
            message_id = %msg.id,
            "Write msg to redis server failed, message dropped"
        );
    }

    async fn pop_head(&self, path_options: &mut PathOptions) -> Option<Arc<LogMessage>> {
        tracing::debug!(queue = %self.queue_name, "Pop msg from head");

        let (msg, stored_options) = match self.read_message().await {
            ReadOutcome::Empty => return None,
            ReadOutcome::Message(msg, stored_options) => (Arc::new(msg), stored_options),
            ReadOutcome::Malformed(head) => {
                self.metrics.record_dropped();
                tracing::error!(
                    queue = %self.queue_name,
                    error = %head.error,
                    slots = head.slots,
                    "Failed to deserialize a log message, dropping it"
                );
                if head.slots > 0 && !self.delete_slots(head.slots).await {
                    tracing::error!(queue = %self.queue_name, "Delete malformed msg from redis server failed");
                }
                return None;
            }
        };

        path_options.flow_control_requested = stored_options.flow_control_requested;

        if self.use_backlog {
            self.backlog().push_back(BacklogEntry {
                message: Arc::clone(&msg),
                path_options: *path_options,
            });
            self.metrics.record_buffered(msg.size());
        }

        if !self.delete_slots(STORE_SLOTS_PER_MESSAGE).await {
            tracing::warn!(
                queue = %self.queue_name,
                message_id = %msg.id,
                "Delete msg from redis server failed, message may be delivered again"
            );
        }

        // Accepted into the pipeline; the final commit is ack_backlog.
        path_options.ack_needed = false;
        msg.ack(path_options, AckType::Processed);

        Some(msg)
    }

    fn ack_backlog(&self, count: usize) -> usize {
        tracing::debug!(queue = %self.queue_name, count, "Ack backlog");

        let acked = self.backlog().take_front(count);
        for entry in &acked {
            self.metrics.record_released(entry.message.size());
        }

        acked.len()
    }

    async fn rewind_backlog(&self, count: usize) -> usize {
        tracing::debug!(queue = %self.queue_name, count, "Rewind backlog msg");

        let rewound = self.backlog().take_front(count);

        for entry in &rewound {
            self.metrics.record_released(entry.message.size());

            if !self.write_message(&entry.message, &entry.path_options).await {
                self.metrics.record_dropped();
                tracing::error!(
                    queue = %self.queue_name,
                    message_id = %entry.message.id,
                    "Pushing backlog msg to redis server failed, message dropped"
                );
            }
        }

        rewound.len()
    }

    fn free(&self) {
        tracing::debug!(queue = %self.queue_name, "Free up");
        self.drop_backlog();
    }
}

impl Drop for RedisQueue {
    fn drop(&mut self) {
        self.drop_backlog();
    }
}

/// Redis key of the list backing a queue.
pub(crate) fn queue_key(keyprefix: &str, persist_name: &str) -> String {
    format!("{}_{}", keyprefix, persist_name)
}

/// Decode the message and marker slots peeked from the head.
///
/// An undecodable message slot is discarded alone: it may be a stray entry
/// written by another producer, and the slot after it can be the start of a
/// valid message. Only a valid message with a corrupt marker is discarded as
/// a pair.
fn decode_slots(items: &[Vec<u8>]) -> Result<(LogMessage, PathOptions), MalformedHead> {
    let missing = |got: usize| MalformedHead {
        error: CodecError::MissingSlot {
            expected: STORE_SLOTS_PER_MESSAGE,
            got,
        },
        slots: got,
    };

    let Some(payload) = items.first() else {
        return Err(missing(0));
    };
    let msg = deserialize_message(payload).map_err(|error| MalformedHead { error, slots: 1 })?;

    let Some(marker) = items.get(1) else {
        return Err(missing(items.len()));
    };
    let path_options = deserialize_options(marker).map_err(|error| MalformedHead {
        error,
        slots: STORE_SLOTS_PER_MESSAGE,
    })?;

    Ok((msg, path_options))
}
