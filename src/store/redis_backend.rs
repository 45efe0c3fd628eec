//! Redis transport for the store client.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;

use crate::config::RedisQueueConfig;

use super::{Reply, StoreCommand, StoreConnection, StoreConnector, StoreError};

/// Opens connections to a Redis server.
pub struct RedisConnector {
    client: Client,
    endpoint: String,
}

impl RedisConnector {
    /// Build a connector for `config`'s host and port. Does not connect.
    pub fn new(config: &RedisQueueConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url().as_str())?;

        Ok(Self {
            client,
            endpoint: config.server_addr(),
        })
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn open(&self, timeout: Duration) -> Result<Box<dyn StoreConnection>, StoreError> {
        let connect = self.client.get_multiplexed_tokio_connection();

        let conn = if timeout.is_zero() {
            connect.await?
        } else {
            tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| StoreError::ConnectTimeout(timeout))??
        };

        tracing::info!(endpoint = %self.endpoint, "Redis connection established");
        Ok(Box::new(RedisConnection { conn }))
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn execute(&mut self, command: &StoreCommand) -> Result<Reply, StoreError> {
        let reply = match command {
            StoreCommand::Ping => {
                let pong: String = redis::cmd("PING").query_async(&mut self.conn).await?;
                Reply::Status(pong)
            }
            StoreCommand::Auth(password) => {
                let ok: String = redis::cmd("AUTH")
                    .arg(password)
                    .query_async(&mut self.conn)
                    .await?;
                Reply::Status(ok)
            }
            StoreCommand::LLen { key } => {
                let len: i64 = redis::cmd("LLEN").arg(key).query_async(&mut self.conn).await?;
                Reply::Integer(len)
            }
            StoreCommand::LRange { key, start, stop } => {
                let items: Vec<Vec<u8>> = redis::cmd("LRANGE")
                    .arg(key)
                    .arg(*start)
                    .arg(*stop)
                    .query_async(&mut self.conn)
                    .await?;
                Reply::Items(items)
            }
            StoreCommand::RPush { key, values } => {
                let mut cmd = redis::cmd("RPUSH");
                cmd.arg(key);
                for value in values {
                    cmd.arg(value.as_slice());
                }
                let len: i64 = cmd.query_async(&mut self.conn).await?;
                Reply::Integer(len)
            }
            StoreCommand::LPop { key, count } => {
                let popped: Option<Vec<Vec<u8>>> = redis::cmd("LPOP")
                    .arg(key)
                    .arg(*count)
                    .query_async(&mut self.conn)
                    .await?;
                popped.map_or(Reply::Nil, Reply::Items)
            }
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_endpoint() {
        let config = RedisQueueConfig {
            host: "10.0.0.5".to_string(),
            port: 6390,
            ..Default::default()
        };
        let connector = RedisConnector::new(&config).unwrap();
        assert_eq!(connector.endpoint(), "10.0.0.5:6390");
    }

    // Requires a network where 10.255.255.1 drops packets instead of refusing
    #[tokio::test]
    #[ignore]
    async fn test_connect_timeout_bounds_open() {
        let config = RedisQueueConfig {
            host: "10.255.255.1".to_string(),
            conn_timeout: 1,
            ..Default::default()
        };
        let connector = RedisConnector::new(&config).unwrap();

        let started = std::time::Instant::now();
        let err = connector.open(config.connect_timeout()).await.err().unwrap();

        assert!(matches!(err, StoreError::ConnectTimeout(t) if t == Duration::from_secs(1)));
        assert!(err.is_connection_error());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    // Requires a running Redis on localhost:6379
    #[tokio::test]
    #[ignore]
    async fn test_live_round_trip() {
        let connector = RedisConnector::new(&RedisQueueConfig::default()).unwrap();
        let mut conn = connector.open(Duration::from_secs(2)).await.unwrap();

        let key = "redisq_live_round_trip".to_string();
        let _ = conn.execute(&StoreCommand::LPop { key: key.clone(), count: 100 }).await;

        conn.execute(&StoreCommand::RPush {
            key: key.clone(),
            values: vec![b"m".to_vec(), b"o".to_vec()],
        })
        .await
        .unwrap();

        let head = conn
            .execute(&StoreCommand::LRange { key: key.clone(), start: 0, stop: 1 })
            .await
            .unwrap();
        assert_eq!(head, Reply::Items(vec![b"m".to_vec(), b"o".to_vec()]));

        let popped = conn
            .execute(&StoreCommand::LPop { key, count: 2 })
            .await
            .unwrap();
        assert_eq!(popped, Reply::Items(vec![b"m".to_vec(), b"o".to_vec()]));
    }
}
