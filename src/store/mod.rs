//! Remote list store access.
//!
//! The queue talks to an ordered-list store through three layers:
//!
//! - [`RedisServer`]: the single connection owner. Serializes commands,
//!   probes liveness and reconnects once when a probe fails.
//! - [`StoreConnector`] / [`StoreConnection`]: the transport seam. Opens a
//!   connection and executes one typed [`StoreCommand`] per round trip.
//! - Implementations: [`RedisConnector`] for a real Redis server and
//!   [`MemoryListStore`] for an in-process list store.

mod health;
pub mod memory;
pub mod redis_backend;
mod server;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::RedisError;

pub use health::{ConnectionHealth, ConnectionHealthStats, ConnectionStatus};
pub use memory::MemoryListStore;
pub use redis_backend::RedisConnector;
pub use server::RedisServer;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Redis operation failed, including error replies
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// No connection is currently established
    #[error("Not connected to the store")]
    NotConnected,

    /// Connecting did not finish in time
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// AUTH was rejected
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// PING did not get a healthy reply
    #[error("Ping failed: {0}")]
    PingFailed(String),

    /// The store replied with an error
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// The store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the connection that produced this error should be discarded.
    pub fn is_connection_error(&self) -> bool {
        match self {
            StoreError::Redis(e) => e.is_connection_dropped() || e.is_io_error(),
            StoreError::NotConnected
            | StoreError::ConnectTimeout(_)
            | StoreError::Unavailable(_) => true,
            StoreError::AuthRejected(_) | StoreError::PingFailed(_) | StoreError::Rejected(_) => {
                false
            }
        }
    }
}

/// One request against the list store.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreCommand {
    Ping,
    Auth(String),
    LLen { key: String },
    LRange { key: String, start: isize, stop: isize },
    RPush { key: String, values: Vec<Vec<u8>> },
    LPop { key: String, count: usize },
}

impl StoreCommand {
    pub fn name(&self) -> &'static str {
        match self {
            StoreCommand::Ping => "PING",
            StoreCommand::Auth(_) => "AUTH",
            StoreCommand::LLen { .. } => "LLEN",
            StoreCommand::LRange { .. } => "LRANGE",
            StoreCommand::RPush { .. } => "RPUSH",
            StoreCommand::LPop { .. } => "LPOP",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            StoreCommand::Ping | StoreCommand::Auth(_) => None,
            StoreCommand::LLen { key }
            | StoreCommand::LRange { key, .. }
            | StoreCommand::RPush { key, .. }
            | StoreCommand::LPop { key, .. } => Some(key),
        }
    }
}

// Payloads and the password stay out of logs.
impl fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreCommand::Ping => write!(f, "PING"),
            StoreCommand::Auth(_) => write!(f, "AUTH <redacted>"),
            StoreCommand::LLen { key } => write!(f, "LLEN {}", key),
            StoreCommand::LRange { key, start, stop } => {
                write!(f, "LRANGE {} {} {}", key, start, stop)
            }
            StoreCommand::RPush { key, values } => {
                let bytes: usize = values.iter().map(Vec::len).sum();
                write!(f, "RPUSH {} <{} values, {} bytes>", key, values.len(), bytes)
            }
            StoreCommand::LPop { key, count } => write!(f, "LPOP {} {}", key, count),
        }
    }
}

/// Decoded non-error reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Integer(i64),
    Items(Vec<Vec<u8>>),
    Nil,
}

impl Reply {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_items(self) -> Option<Vec<Vec<u8>>> {
        match self {
            Reply::Items(items) => Some(items),
            Reply::Nil => Some(Vec::new()),
            _ => None,
        }
    }
}

/// An established connection. Request/response, one command at a time.
#[async_trait]
pub trait StoreConnection: Send {
    async fn execute(&mut self, command: &StoreCommand) -> Result<Reply, StoreError>;
}

/// Opens connections to one store endpoint.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a connection. A zero `timeout` waits indefinitely.
    async fn open(&self, timeout: Duration) -> Result<Box<dyn StoreConnection>, StoreError>;

    /// Endpoint label used in logs and metrics
    fn endpoint(&self) -> String;
}
