//! Configuration management for all services

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub seckill: SeckillConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub connection_timeout_seconds: u64,
}

/// Cache-aside tuning shared by both rebuild strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hard TTL for entities written by the mutex strategy.
    pub entity_ttl_seconds: u64,
    /// TTL of the empty marker that remembers a missing row.
    pub null_ttl_seconds: u64,
    /// Logical expiry window for hot keys.
    pub logical_ttl_seconds: u64,
    /// Lease of the rebuild lock.
    pub lock_lease_seconds: u64,
    /// Sleep between retries when the rebuild lock is held elsewhere.
    pub lock_retry_millis: u64,
    /// Retries before a contended read gives up.
    pub lock_max_retries: u32,
    /// Background rebuild workers. 0 means "pick from CPU count".
    pub rebuild_workers: usize,
    /// Pending rebuild tasks accepted before submissions are refused.
    pub rebuild_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeckillConfig {
    pub queue_capacity: usize,
    pub order_lock_lease_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/shopreview".to_string(),
            max_connections: 20,
            min_connections: 5,
            acquire_timeout_seconds: 5,
            idle_timeout_seconds: 300,
            max_lifetime_seconds: 1800,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 32,
            connection_timeout_seconds: 5,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            port: 8000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl_seconds: 1800, // 30 minutes
            null_ttl_seconds: 120,    // 2 minutes
            logical_ttl_seconds: 1800,
            lock_lease_seconds: 10,
            lock_retry_millis: 50,
            lock_max_retries: 100,
            rebuild_workers: 0,
            rebuild_queue_capacity: 1024,
        }
    }
}

impl Default for SeckillConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 65536,
            order_lock_lease_seconds: 30,
        }
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let (db, redis, cache, seckill, app) = (
            defaults.database,
            defaults.redis,
            defaults.cache,
            defaults.seckill,
            defaults.app,
        );

        Ok(Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(db.url),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", db.max_connections)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", db.min_connections)?,
                acquire_timeout_seconds: env_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", db.acquire_timeout_seconds)?,
                idle_timeout_seconds: env_or("DATABASE_IDLE_TIMEOUT_SECONDS", db.idle_timeout_seconds)?,
                max_lifetime_seconds: env_or("DATABASE_MAX_LIFETIME_SECONDS", db.max_lifetime_seconds)?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or(redis.url),
                pool_size: env_or("REDIS_POOL_SIZE", redis.pool_size)?,
                connection_timeout_seconds: env_or("REDIS_CONNECTION_TIMEOUT_SECONDS", redis.connection_timeout_seconds)?,
            },
            cache: CacheConfig {
                entity_ttl_seconds: env_or("CACHE_ENTITY_TTL_SECONDS", cache.entity_ttl_seconds)?,
                null_ttl_seconds: env_or("CACHE_NULL_TTL_SECONDS", cache.null_ttl_seconds)?,
                logical_ttl_seconds: env_or("CACHE_LOGICAL_TTL_SECONDS", cache.logical_ttl_seconds)?,
                lock_lease_seconds: env_or("CACHE_LOCK_LEASE_SECONDS", cache.lock_lease_seconds)?,
                lock_retry_millis: env_or("CACHE_LOCK_RETRY_MS", cache.lock_retry_millis)?,
                lock_max_retries: env_or("CACHE_LOCK_MAX_RETRIES", cache.lock_max_retries)?,
                rebuild_workers: env_or("CACHE_REBUILD_WORKERS", cache.rebuild_workers)?,
                rebuild_queue_capacity: env_or("CACHE_REBUILD_QUEUE_CAPACITY", cache.rebuild_queue_capacity)?,
            },
            seckill: SeckillConfig {
                queue_capacity: env_or("SECKILL_QUEUE_CAPACITY", seckill.queue_capacity)?,
                order_lock_lease_seconds: env_or("SECKILL_ORDER_LOCK_SECONDS", seckill.order_lock_lease_seconds)?,
            },
            app: AppConfig {
                environment: env::var("ENVIRONMENT").unwrap_or(app.environment),
                log_level: env::var("RUST_LOG").unwrap_or(app.log_level),
                port: env_or("PORT", app.port)?,
            },
        })
    }
}
