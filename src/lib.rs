//! Reliable log queue over a Redis list.
//!
//! Producers append messages with [`LogQueue::push_tail`]; a consumer takes
//! them with [`LogQueue::pop_head`] and later commits them with
//! [`LogQueue::ack_backlog`] or returns them for redelivery with
//! [`LogQueue::rewind_backlog`].
//!
//! [`LogQueue::push_tail`]: queue::LogQueue::push_tail
//! [`LogQueue::pop_head`]: queue::LogQueue::pop_head
//! [`LogQueue::ack_backlog`]: queue::LogQueue::ack_backlog
//! [`LogQueue::rewind_backlog`]: queue::LogQueue::rewind_backlog

// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain
pub mod message;
pub mod queue;
pub mod store;
