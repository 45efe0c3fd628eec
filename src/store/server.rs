//! Single-connection store client with reconnect-on-failed-probe.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RedisQueueConfig;
use crate::metrics::StoreMetrics;

use super::{
    ConnectionHealth, ConnectionHealthStats, Reply, StoreCommand, StoreConnection,
    StoreConnector, StoreError,
};

type ConnectionSlot = Option<Box<dyn StoreConnection>>;

/// Owner of the one connection to the list store.
///
/// Every command runs under `connection`'s lock for exactly one
/// request/response round trip; the protocol is not pipelined. The only
/// self-healing path is [`is_alive`](Self::is_alive): a failed probe triggers
/// a single reconnect, with no backoff and no retry budget.
pub struct RedisServer {
    config: RedisQueueConfig,
    connector: Arc<dyn StoreConnector>,
    connection: Mutex<ConnectionSlot>,
    health: ConnectionHealth,
    endpoint: String,
}

impl RedisServer {
    /// Create a client and attempt the initial connection.
    ///
    /// A failed initial connect is logged and leaves the client
    /// disconnected; the next liveness probe retries it.
    pub async fn new(config: RedisQueueConfig, connector: Arc<dyn StoreConnector>) -> Self {
        let server = Self::disconnected(config, connector);
        tracing::debug!(endpoint = %server.endpoint, "Creating redis server client");
        if let Err(e) = server.connect().await {
            tracing::debug!(
                endpoint = %server.endpoint,
                error = %e,
                "Initial connect failed, next liveness probe retries"
            );
        }
        server
    }

    /// Create a client without connecting.
    pub fn disconnected(config: RedisQueueConfig, connector: Arc<dyn StoreConnector>) -> Self {
        let endpoint = connector.endpoint();
        StoreMetrics::set_connected(&endpoint, false);
        Self {
            config,
            connector,
            connection: Mutex::new(None),
            health: ConnectionHealth::new(),
            endpoint,
        }
    }

    pub fn config(&self) -> &RedisQueueConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a connection is currently held. Does not touch the network.
    pub fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    pub fn health(&self) -> ConnectionHealthStats {
        self.health.stats()
    }

    /// Open the connection, authenticate if configured, then PING.
    pub async fn connect(&self) -> Result<(), StoreError> {
        let mut slot = self.connection.lock().await;
        self.connect_locked(&mut slot).await
    }

    /// Drop the current connection, if any, and connect again.
    pub async fn reconnect(&self) -> Result<(), StoreError> {
        tracing::debug!(endpoint = %self.endpoint, "Reconnecting to redis server");

        let mut slot = self.connection.lock().await;
        *slot = None;
        self.health.set_reconnecting();
        StoreMetrics::record_reconnect(&self.endpoint);

        self.connect_locked(&mut slot).await
    }

    /// Release the connection. Safe to call when not connected.
    pub async fn disconnect(&self) {
        let mut slot = self.connection.lock().await;
        if slot.take().is_some() {
            tracing::debug!(endpoint = %self.endpoint, "Redis disconnect");
        }
        self.health.set_disconnected(None);
        StoreMetrics::set_connected(&self.endpoint, false);
    }

    /// PING the store; on failure reconnect once and report the outcome.
    pub async fn is_alive(&self) -> bool {
        if self.execute(&StoreCommand::Ping).await.is_ok() {
            return true;
        }

        if let Err(e) = self.reconnect().await {
            tracing::error!(
                endpoint = %self.endpoint,
                error = %e,
                "There is no redis connection, operation will fail"
            );
            return false;
        }

        true
    }

    /// Execute `command`; true iff a non-error reply came back.
    pub async fn send_command(&self, command: &StoreCommand) -> bool {
        self.get_reply(command).await.is_some()
    }

    /// Execute `command` and return its reply, or `None` on any failure.
    pub async fn get_reply(&self, command: &StoreCommand) -> Option<Reply> {
        match self.execute(command).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    command = command.name(),
                    key = command.key().unwrap_or(""),
                    error = %e,
                    "Redis command failed"
                );
                None
            }
        }
    }

    /// One locked round trip. Transport failures discard the connection.
    async fn execute(&self, command: &StoreCommand) -> Result<Reply, StoreError> {
        let mut slot = self.connection.lock().await;

        let result = match slot.as_mut() {
            Some(conn) => conn.execute(command).await,
            None => Err(StoreError::NotConnected),
        };

        tracing::debug!(command = ?command, ok = result.is_ok(), "Sent redis command");

        if let Err(ref e) = result {
            StoreMetrics::record_command_failure(&self.endpoint);
            if e.is_connection_error() && slot.take().is_some() {
                self.health.set_disconnected(Some(e.to_string()));
                StoreMetrics::set_connected(&self.endpoint, false);
            }
        }

        result
    }

    async fn connect_locked(&self, slot: &mut ConnectionSlot) -> Result<(), StoreError> {
        tracing::debug!(endpoint = %self.endpoint, "Connecting to redis server");

        let mut conn = match self.connector.open(self.config.connect_timeout()).await {
            Ok(conn) => conn,
            Err(e) => return Err(self.connect_failed(e, "Redis server error, suspending")),
        };

        if let Some(password) = &self.config.auth {
            if let Err(e) = conn.execute(&StoreCommand::Auth(password.clone())).await {
                return Err(self.connect_failed(
                    StoreError::AuthRejected(e.to_string()),
                    "Failed to authenticate with redis server",
                ));
            }
        }

        if let Err(e) = conn.execute(&StoreCommand::Ping).await {
            return Err(self.connect_failed(
                StoreError::PingFailed(e.to_string()),
                "Ping to redis server failed",
            ));
        }

        *slot = Some(conn);
        self.health.set_connected();
        StoreMetrics::set_connected(&self.endpoint, true);
        tracing::debug!(endpoint = %self.endpoint, "Connection to redis server succeeded");

        Ok(())
    }

    fn connect_failed(&self, error: StoreError, message: &'static str) -> StoreError {
        tracing::error!(endpoint = %self.endpoint, error = %error, "{}", message);
        self.health.set_disconnected(Some(error.to_string()));
        StoreMetrics::set_connected(&self.endpoint, false);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ConnectionStatus, MemoryListStore};

    fn config() -> RedisQueueConfig {
        RedisQueueConfig {
            conn_timeout: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_connects() {
        let store = MemoryListStore::new();
        let server = RedisServer::new(config(), Arc::new(store.clone())).await;

        assert!(server.is_connected());
        assert_eq!(store.connections_opened(), 1);
        assert!(server.send_command(&StoreCommand::Ping).await);
    }

    #[tokio::test]
    async fn test_new_with_store_down_stays_disconnected() {
        let store = MemoryListStore::new();
        store.set_available(false);
        let server = RedisServer::new(config(), Arc::new(store.clone())).await;

        assert!(!server.is_connected());
        assert_eq!(server.health().status, ConnectionStatus::Disconnected);
        assert!(server.health().last_error.is_some());
        assert!(!server.send_command(&StoreCommand::Ping).await);

        // The failed initial connect is retried by the next probe.
        store.set_available(true);
        assert!(server.is_alive().await);
        assert!(server.is_connected());
    }

    #[tokio::test]
    async fn test_auth_sent_when_configured() {
        let store = MemoryListStore::with_password("s3cret");
        let config = RedisQueueConfig {
            auth: Some("s3cret".to_string()),
            ..config()
        };
        let server = RedisServer::new(config, Arc::new(store)).await;

        assert!(server.is_connected());
    }

    #[tokio::test]
    async fn test_wrong_password_fails_connect() {
        let store = MemoryListStore::with_password("s3cret");
        let config = RedisQueueConfig {
            auth: Some("guess".to_string()),
            ..config()
        };
        let server = RedisServer::disconnected(config, Arc::new(store));

        let err = server.connect().await.unwrap_err();
        assert!(matches!(err, StoreError::AuthRejected(_)));
        assert!(!server.is_connected());
    }

    #[tokio::test]
    async fn test_missing_password_fails_ping() {
        let store = MemoryListStore::with_password("s3cret");
        let server = RedisServer::disconnected(config(), Arc::new(store));

        let err = server.connect().await.unwrap_err();
        assert!(matches!(err, StoreError::PingFailed(_)));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let store = MemoryListStore::new();
        let server = RedisServer::new(config(), Arc::new(store)).await;

        server.disconnect().await;
        server.disconnect().await;

        assert!(!server.is_connected());
        assert!(server.get_reply(&StoreCommand::Ping).await.is_none());
    }

    #[tokio::test]
    async fn test_is_alive_reconnects_after_reset() {
        let store = MemoryListStore::new();
        let server = RedisServer::new(config(), Arc::new(store.clone())).await;

        // Breaks the open connection; the store accepts new ones again.
        store.reset_connections();

        assert!(server.is_alive().await);
        assert_eq!(store.connections_opened(), 2);
        assert_eq!(server.health().total_reconnections, 1);
        assert!(server.send_command(&StoreCommand::Ping).await);
    }

    #[tokio::test]
    async fn test_is_alive_reports_failed_reconnect() {
        let store = MemoryListStore::new();
        let server = RedisServer::new(config(), Arc::new(store.clone())).await;

        store.set_available(false);

        assert!(!server.is_alive().await);
        assert!(!server.is_connected());

        store.set_available(true);
        assert!(server.is_alive().await);
    }

    #[tokio::test]
    async fn test_error_reply_keeps_connection() {
        let store = MemoryListStore::new();
        let server = RedisServer::new(config(), Arc::new(store.clone())).await;
        store.fail_command("LLEN");

        let cmd = StoreCommand::LLen {
            key: "redisq_test".to_string(),
        };
        assert!(server.get_reply(&cmd).await.is_none());
        assert!(server.is_connected());
        assert_eq!(store.connections_opened(), 1);
    }
}
