use std::env;

use anyhow::Result;

use redisq::config::Settings;
use redisq::error::Result as AppResult;
use redisq::metrics::encode_metrics;
use redisq::queue::{create_redis_queue, LogQueue};
use redisq::telemetry::init_tracing;

/// Connects to the configured Redis, reports the depth of one queue and
/// exits. The persist name is the first argument, `default` if omitted.
#[tokio::main]
async fn main() -> Result<()> {
    let persist_name = env::args().nth(1).unwrap_or_else(|| "default".to_string());
    run(&persist_name).await?;
    Ok(())
}

async fn run(persist_name: &str) -> AppResult<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.telemetry)?;
    tracing::info!("Configuration loaded");

    let queue = create_redis_queue(&settings.redis, persist_name).await?;
    let depth = queue.get_length().await;
    let health = queue.server().health();

    tracing::info!(
        queue = %queue.queue_name(),
        queue_type = queue.queue_type(),
        depth,
        status = health.status.as_str(),
        "Queue status"
    );

    queue.free();
    queue.server().disconnect().await;

    print!("{}", encode_metrics()?);
    Ok(())
}
