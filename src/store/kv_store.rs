//! Key-value store seam used by the cache, lock, id and seckill components.
//!
//! Two implementations exist: [`RedisKvStore`](super::redis_store::RedisKvStore) for
//! production and [`InMemoryKvStore`](super::memory_store::InMemoryKvStore)
//! for tests and single-node development. The multi-step operations
//! (`compare_and_delete`, `seckill_reserve`, `seckill_release`) must be atomic
//! in every implementation: Redis runs them as Lua scripts, the in-memory
//! store runs them under one mutex.

use async_trait::async_trait;
use std::time::Duration;

pub type KvResult<T> = std::result::Result<T, KvError>;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("KV store unavailable: {0}")]
    Unavailable(String),

    #[error("KV command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("Key {key} holds a value of the wrong type")]
    WrongType { key: String },

    #[error("Unexpected script reply: {0}")]
    UnexpectedReply(i64),
}

/// Reply of the seckill admission script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionCode {
    Ok = 0,
    StockEmpty = 1,
    LimitExceeded = 2,
}

impl AdmissionCode {
    pub fn from_code(code: i64) -> KvResult<Self> {
        match code {
            0 => Ok(Self::Ok),
            1 => Ok(Self::StockEmpty),
            2 => Ok(Self::LimitExceeded),
            other => Err(KvError::UnexpectedReply(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::StockEmpty => "stock_empty",
            Self::LimitExceeded => "limit_exceeded",
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Plain SET. `None` ttl means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// SET NX PX. Returns true iff the key was absent and is now set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    async fn delete(&self, key: &str) -> KvResult<bool>;

    async fn incr(&self, key: &str) -> KvResult<i64>;

    /// Delete `key` only while it still holds `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> KvResult<bool>;

    async fn set_is_member(&self, key: &str, member: &str) -> KvResult<bool>;

    /// Check stock and the per-user set, then decrement and record the user,
    /// all in one atomic step.
    async fn seckill_reserve(
        &self,
        stock_key: &str,
        ordered_key: &str,
        user_id: &str,
    ) -> KvResult<AdmissionCode>;

    /// Undo a reservation made by [`seckill_reserve`](Self::seckill_reserve).
    /// Returns false when the user held no reservation.
    async fn seckill_release(
        &self,
        stock_key: &str,
        ordered_key: &str,
        user_id: &str,
    ) -> KvResult<bool>;

    async fn ping(&self) -> KvResult<()>;
}
