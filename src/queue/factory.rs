//! Queue factory

use std::sync::Arc;

use crate::config::RedisQueueConfig;
use crate::store::{RedisConnector, RedisServer, StoreConnector};

use super::{QueueError, RedisQueue};

/// Create a Redis-backed queue from configuration.
///
/// Builds the connector and the store client, connects, and creates the
/// queue for `persist_name`. Fails if Redis cannot be reached.
///
/// # Example
///
/// ```rust,ignore
/// let queue = create_redis_queue(&settings.redis, "d_elastic#0").await?;
/// ```
pub async fn create_redis_queue(
    config: &RedisQueueConfig,
    persist_name: &str,
) -> Result<RedisQueue, QueueError> {
    let connector = RedisConnector::new(config)?;
    create_queue_with_connector(config, Arc::new(connector), persist_name).await
}

/// Create a queue over any store connector, e.g. a
/// [`MemoryListStore`](crate::store::MemoryListStore).
pub async fn create_queue_with_connector(
    config: &RedisQueueConfig,
    connector: Arc<dyn StoreConnector>,
    persist_name: &str,
) -> Result<RedisQueue, QueueError> {
    tracing::info!(
        endpoint = %connector.endpoint(),
        keyprefix = %config.keyprefix,
        persist_name = %persist_name,
        use_backlog = config.use_backlog,
        "Creating redis log queue"
    );

    let server = Arc::new(RedisServer::new(config.clone(), connector).await);
    RedisQueue::new(server, persist_name, config.use_backlog).await
}
