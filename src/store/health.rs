//! Store connection health tracking

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

/// Connection status of a store client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Connected and answered the last probe
    Connected,
    /// No connection, nothing in progress
    Disconnected,
    /// A reconnect is in progress
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

/// Connection state of a store client.
///
/// Only the client's connect / reconnect / disconnect paths write to it.
pub struct ConnectionHealth {
    status: AtomicU8,
    last_connected: AtomicI64,
    reconnection_attempts: AtomicU32,
    total_reconnections: AtomicU32,
    last_error: Mutex<Option<String>>,
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ConnectionStatus::Disconnected as u8),
            last_connected: AtomicI64::new(0),
            reconnection_attempts: AtomicU32::new(0),
            total_reconnections: AtomicU32::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn set_connected(&self) {
        let was_reconnecting =
            self.status.load(Ordering::Acquire) == ConnectionStatus::Reconnecting as u8;
        self.status
            .store(ConnectionStatus::Connected as u8, Ordering::Release);
        self.last_connected
            .store(Utc::now().timestamp_millis(), Ordering::Release);

        if was_reconnecting {
            self.total_reconnections.fetch_add(1, Ordering::AcqRel);
        }
        self.reconnection_attempts.store(0, Ordering::Release);
        *self.error_slot() = None;
    }

    pub(crate) fn set_reconnecting(&self) {
        self.status
            .store(ConnectionStatus::Reconnecting as u8, Ordering::Release);
        self.reconnection_attempts.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark as disconnected. `error` replaces the last error when given.
    pub(crate) fn set_disconnected(&self, error: Option<String>) {
        self.status
            .store(ConnectionStatus::Disconnected as u8, Ordering::Release);
        if error.is_some() {
            *self.error_slot() = error;
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.status.load(Ordering::Acquire) {
            0 => ConnectionStatus::Connected,
            1 => ConnectionStatus::Disconnected,
            _ => ConnectionStatus::Reconnecting,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn last_error(&self) -> Option<String> {
        self.error_slot().clone()
    }

    pub fn stats(&self) -> ConnectionHealthStats {
        ConnectionHealthStats {
            status: self.status(),
            last_connected_ms: self.last_connected.load(Ordering::Acquire),
            reconnection_attempts: self.reconnection_attempts.load(Ordering::Acquire),
            total_reconnections: self.total_reconnections.load(Ordering::Acquire),
            last_error: self.last_error(),
        }
    }

    fn error_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionHealthStats {
    pub status: ConnectionStatus,
    pub last_connected_ms: i64,
    pub reconnection_attempts: u32,
    pub total_reconnections: u32,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_transitions() {
        let health = ConnectionHealth::new();
        assert_eq!(health.status(), ConnectionStatus::Disconnected);
        assert!(!health.is_connected());

        health.set_connected();
        assert_eq!(health.status(), ConnectionStatus::Connected);
        assert!(health.is_connected());

        health.set_reconnecting();
        assert_eq!(health.status(), ConnectionStatus::Reconnecting);
    }

    #[test]
    fn test_reconnect_stats() {
        let health = ConnectionHealth::new();

        health.set_connected();
        health.set_reconnecting();
        health.set_disconnected(Some("connection refused".to_string()));
        health.set_reconnecting();
        health.set_connected();

        let stats = health.stats();
        assert_eq!(stats.status, ConnectionStatus::Connected);
        assert_eq!(stats.total_reconnections, 1);
        assert_eq!(stats.reconnection_attempts, 0); // Reset on connect
        assert!(stats.last_error.is_none());
    }

    #[test]
    fn test_last_error_kept_until_connected() {
        let health = ConnectionHealth::new();

        health.set_disconnected(Some("timeout".to_string()));
        health.set_disconnected(None);

        assert_eq!(health.last_error().as_deref(), Some("timeout"));
    }

    #[test]
    fn test_stats_serialize() {
        let health = ConnectionHealth::new();
        health.set_disconnected(Some("connection refused".to_string()));

        let json = serde_json::to_value(health.stats()).unwrap();
        assert_eq!(json["status"], "disconnected");
        assert_eq!(json["last_error"], "connection refused");
        assert_eq!(json["total_reconnections"], 0);
    }
}
