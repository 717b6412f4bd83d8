// Connection pool construction for the backing store and the KV store
use deadpool_redis::{Config as RedisPoolConfig, Pool as RedisPool, PoolConfig, Runtime};
use shared::config::{DatabaseConfig, RedisConfig};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

/// Create the Postgres pool
pub async fn create_optimized_db_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!("🔧 Creating database pool with {} max connections", config.max_connections);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    info!("✅ Database pool created successfully");
    Ok(pool)
}

/// Create the Redis connection pool
pub fn create_redis_pool(config: &RedisConfig) -> anyhow::Result<RedisPool> {
    info!("🔧 Creating Redis pool with {} connections", config.pool_size);

    let mut pool_config = RedisPoolConfig::from_url(&config.url);
    let mut limits = PoolConfig::new(config.pool_size);
    limits.timeouts.wait = Some(Duration::from_secs(config.connection_timeout_seconds));
    limits.timeouts.create = Some(Duration::from_secs(config.connection_timeout_seconds));
    pool_config.pool = Some(limits);

    let pool = pool_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {}", e))?;

    info!("✅ Redis pool created successfully");
    Ok(pool)
}
