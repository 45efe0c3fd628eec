//! Log messages and their delivery path options.
//!
//! The queue only needs three things from a message: a lossless byte
//! encoding (see [`codec`]), an approximate memory size for the backlog
//! gauges, and a way to acknowledge it back to whoever produced it.

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use codec::{
    deserialize_message, deserialize_options, serialize_message, serialize_options, CodecError,
};

/// How a message left the pipeline stage that acknowledges it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckType {
    /// Delivered or durably handed off
    Processed,
    /// Destination suspended, the producer may resend
    Suspended,
    /// Delivery aborted
    Aborted,
}

/// Producer-side acknowledgement hook attached to a message.
///
/// Sources implement this to learn when a message they emitted has been
/// accepted so they can release flow-control windows.
pub trait AckRecord: Send + Sync + fmt::Debug {
    fn ack(&self, message_id: Uuid, ack_type: AckType);
}

/// Per-delivery options travelling alongside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOptions {
    /// Whether the receiver of this delivery must acknowledge the message
    pub ack_needed: bool,
    /// Whether the producer asked for flow control on this path
    pub flow_control_requested: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            ack_needed: true,
            flow_control_requested: false,
        }
    }
}

/// A single log record.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub host: String,
    pub program: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub message: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Never persisted: a message read back from the store has no producer.
    #[serde(skip)]
    ack_record: Option<Arc<dyn AckRecord>>,
}

impl LogMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            host: String::new(),
            program: String::new(),
            pid: None,
            message: message.into(),
            values: BTreeMap::new(),
            tags: Vec::new(),
            ack_record: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>, pid: Option<u32>) -> Self {
        self.program = program.into();
        self.pid = pid;
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_ack_record(mut self, record: Arc<dyn AckRecord>) -> Self {
        self.ack_record = Some(record);
        self
    }

    pub fn has_ack_record(&self) -> bool {
        self.ack_record.is_some()
    }

    /// Acknowledge the message to its producer.
    ///
    /// Does nothing unless `path_options.ack_needed` is set and the message
    /// carries an ack record.
    pub fn ack(&self, path_options: &PathOptions, ack_type: AckType) {
        if !path_options.ack_needed {
            return;
        }
        if let Some(record) = &self.ack_record {
            record.ack(self.id, ack_type);
        }
    }

    /// Approximate heap and inline footprint, used for the memory gauge.
    pub fn size(&self) -> usize {
        let values: usize = self
            .values
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let tags: usize = self.tags.iter().map(String::len).sum();

        std::mem::size_of::<Self>()
            + self.host.len()
            + self.program.len()
            + self.message.len()
            + values
            + tags
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessage")
            .field("id", &self.id)
            .field("received_at", &self.received_at)
            .field("host", &self.host)
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("message", &self.message)
            .field("values", &self.values)
            .field("tags", &self.tags)
            .field("has_ack_record", &self.ack_record.is_some())
            .finish()
    }
}
