//! In-flight buffer of messages handed to the consumer but not yet acked.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::message::{LogMessage, PathOptions};

/// A delivered message and the options it was delivered with.
#[derive(Debug, Clone)]
pub struct BacklogEntry {
    pub message: Arc<LogMessage>,
    pub path_options: PathOptions,
}

/// FIFO of [`BacklogEntry`]. Ack and rewind always consume from the front.
#[derive(Debug, Default)]
pub struct Backlog {
    entries: VecDeque<BacklogEntry>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, entry: BacklogEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop_front(&mut self) -> Option<BacklogEntry> {
        self.entries.pop_front()
    }

    /// Remove up to `count` entries from the front, oldest first.
    pub fn take_front(&mut self, count: usize) -> Vec<BacklogEntry> {
        let count = count.min(self.entries.len());
        self.entries.drain(..count).collect()
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> Vec<BacklogEntry> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
