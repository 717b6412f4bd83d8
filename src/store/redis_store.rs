// ============================================================================
// REDIS KV STORE
// ============================================================================
// Pooled Redis implementation of the KvStore seam. Multi-step operations run
// as Lua scripts so no other client can interleave between read and write.
// ============================================================================

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::{debug, error};

use super::kv_store::{AdmissionCode, KvError, KvResult, KvStore};

const UNLOCK_SCRIPT: &str = include_str!("scripts/unlock.lua");
const SECKILL_SCRIPT: &str = include_str!("scripts/seckill.lua");
const SECKILL_RELEASE_SCRIPT: &str = include_str!("scripts/seckill_release.lua");

#[derive(Clone)]
pub struct RedisKvStore {
    pool: Pool,
    unlock: Script,
    seckill: Script,
    seckill_release: Script,
}

impl RedisKvStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            unlock: Script::new(UNLOCK_SCRIPT),
            seckill: Script::new(SECKILL_SCRIPT),
            seckill_release: Script::new(SECKILL_RELEASE_SCRIPT),
        }
    }

    /// Get a Redis connection from the pool
    async fn get_connection(&self) -> KvResult<Connection> {
        self.pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection: {}", e);
            KvError::Unavailable(e.to_string())
        })
    }
}

/// PX rejects 0, so sub-millisecond leases round up.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let mut conn = self.get_connection().await?;
        match ttl {
            Some(ttl) => conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        debug!(key = %key, ttl_ms = ttl.map(ttl_millis), "Redis key set");
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.get_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.get_connection().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.get_connection().await?;
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> KvResult<bool> {
        let mut conn = self.get_connection().await?;
        let deleted: i64 = self
            .unlock
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn set_is_member(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut conn = self.get_connection().await?;
        let is_member: bool = conn.sismember(key, member).await?;
        Ok(is_member)
    }

    async fn seckill_reserve(
        &self,
        stock_key: &str,
        ordered_key: &str,
        user_id: &str,
    ) -> KvResult<AdmissionCode> {
        let mut conn = self.get_connection().await?;
        let code: i64 = self
            .seckill
            .key(stock_key)
            .key(ordered_key)
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        AdmissionCode::from_code(code)
    }

    async fn seckill_release(
        &self,
        stock_key: &str,
        ordered_key: &str,
        user_id: &str,
    ) -> KvResult<bool> {
        let mut conn = self.get_connection().await?;
        let released: i64 = self
            .seckill_release
            .key(stock_key)
            .key(ordered_key)
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(released == 1)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.get_connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_rounds_up_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
    }
}
