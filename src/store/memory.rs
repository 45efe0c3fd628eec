//! In-process list store.
//!
//! Implements the subset of list commands the queue uses with Redis
//! semantics, so a [`RedisServer`](super::RedisServer) can run without a
//! network. Outages and error replies can be injected to exercise the
//! reconnect and drop paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{Reply, StoreCommand, StoreConnection, StoreConnector, StoreError};

#[derive(Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    password: Option<String>,
    unavailable: bool,
    /// Bumped to break every connection opened before it
    generation: u64,
    failing: HashSet<&'static str>,
    connections_opened: usize,
}

/// Shared in-memory list store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryListStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that requires `AUTH password` before any other command.
    pub fn with_password(password: impl Into<String>) -> Self {
        let store = Self::default();
        store.state().password = Some(password.into());
        store
    }

    /// Simulate an outage. Going down also breaks open connections.
    pub fn set_available(&self, available: bool) {
        let mut state = self.state();
        if !available && !state.unavailable {
            state.generation += 1;
        }
        state.unavailable = !available;
    }

    /// Break every open connection while still accepting new ones.
    pub fn reset_connections(&self) {
        self.state().generation += 1;
    }

    /// Make every future `command` (e.g. `"LPOP"`) get an error reply.
    pub fn fail_command(&self, command: &'static str) {
        self.state().failing.insert(command);
    }

    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    pub fn connections_opened(&self) -> usize {
        self.state().connections_opened
    }

    /// Snapshot of the list stored under `key`.
    pub fn list(&self, key: &str) -> Vec<Vec<u8>> {
        self.state()
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append raw bytes, bypassing any connection.
    pub fn push_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.state()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.into());
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StoreConnector for MemoryListStore {
    async fn open(&self, _timeout: Duration) -> Result<Box<dyn StoreConnection>, StoreError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        state.connections_opened += 1;

        Ok(Box::new(MemoryConnection {
            store: self.clone(),
            generation: state.generation,
            authenticated: false,
        }))
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryConnection {
    store: MemoryListStore,
    generation: u64,
    authenticated: bool,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn execute(&mut self, command: &StoreCommand) -> Result<Reply, StoreError> {
        let mut state = self.store.state();

        if state.unavailable || state.generation != self.generation {
            return Err(StoreError::Unavailable("connection reset by peer".to_string()));
        }
        if state.failing.contains(command.name()) {
            return Err(StoreError::Rejected(format!("ERR injected {} failure", command.name())));
        }

        let is_auth = matches!(command, StoreCommand::Auth(_));
        if state.password.is_some() && !self.authenticated && !is_auth {
            return Err(StoreError::Rejected("NOAUTH Authentication required".to_string()));
        }

        let reply = match command {
            StoreCommand::Auth(password) => match &state.password {
                Some(expected) if expected == password => {
                    self.authenticated = true;
                    Reply::Status("OK".to_string())
                }
                Some(_) => {
                    return Err(StoreError::Rejected("WRONGPASS invalid password".to_string()))
                }
                None => {
                    return Err(StoreError::Rejected(
                        "ERR AUTH called without any password configured".to_string(),
                    ))
                }
            },
            StoreCommand::Ping => Reply::Status("PONG".to_string()),
            StoreCommand::LLen { key } => {
                Reply::Integer(state.lists.get(key).map_or(0, |l| l.len() as i64))
            }
            StoreCommand::LRange { key, start, stop } => {
                let items = state
                    .lists
                    .get(key)
                    .map(|list| range(list, *start, *stop))
                    .unwrap_or_default();
                Reply::Items(items)
            }
            StoreCommand::RPush { key, values } => {
                let list = state.lists.entry(key.clone()).or_default();
                list.extend(values.iter().cloned());
                Reply::Integer(list.len() as i64)
            }
            StoreCommand::LPop { key, count } => {
                let Some(list) = state.lists.get_mut(key) else {
                    return Ok(Reply::Nil);
                };
                let take = (*count).min(list.len());
                let popped: Vec<Vec<u8>> = list.drain(..take).collect();
                if list.is_empty() {
                    state.lists.remove(key);
                }
                if popped.is_empty() {
                    Reply::Nil
                } else {
                    Reply::Items(popped)
                }
            }
        };

        Ok(reply)
    }
}

/// LRANGE index rules: negative indexes count from the end, `stop` is
/// inclusive and clamped.
fn range(list: &VecDeque<Vec<u8>>, start: isize, stop: isize) -> Vec<Vec<u8>> {
    let len = list.len() as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return Vec::new();
    }

    list.range(start as usize..=stop as usize).cloned().collect()
}
