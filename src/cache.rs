// ============================================================================
// CACHE CLIENT
// ============================================================================
// Cache-aside reads in front of the backing store.
//
// Both strategies remember confirmed-missing rows with an empty marker so a
// flood of lookups for ids that do not exist never reaches the database.
//
// Strategy A (`query_with_mutex`): on a miss exactly one caller rebuilds the
// entry under a distributed lock while the others sleep and re-read.
//
// Strategy B (`query_with_logical_expire`): hot entries never expire in the
// store. They carry their own expiry timestamp; a stale read is served
// immediately and a single background rebuild refreshes it.
// ============================================================================

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::config::CacheConfig;
use shared::AppError;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::cache_key;
use crate::observability::{record_cache_lookup, record_cache_rebuild};
use crate::services::{DistributedLock, LockError, LockService, RebuildPool};
use crate::store::{KvError, KvStore};

/// Value cached for a row the backing store does not have.
pub const EMPTY_MARKER: &str = "";

const MUTEX: &str = "mutex";
const LOGICAL: &str = "logical";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] KvError),

    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backing store lookup failed: {0}")]
    Backend(anyhow::Error),

    #[error("rebuild lock for {key} still busy after {attempts} attempts")]
    LockContention { key: String, attempts: u32 },
}

impl From<LockError> for CacheError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Store(e) => CacheError::Store(e),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Store(e) => AppError::service_unavailable(format!("cache store: {}", e)),
            CacheError::Serialization(e) => AppError::Serialization(e),
            CacheError::Backend(e) => AppError::Generic(e),
            CacheError::LockContention { key, .. } => {
                AppError::service_unavailable(format!("rebuild lock for {}", key))
            }
        }
    }
}

/// Payload of a logical-expiry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalEntry<T> {
    pub expire_time: DateTime<Utc>,
    pub data: T,
}

impl<T> LogicalEntry<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_time <= now
    }
}

#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    locks: LockService,
    rebuild_pool: Arc<RebuildPool>,
    config: CacheConfig,
}

impl CacheClient {
    pub fn new(
        store: Arc<dyn KvStore>,
        locks: LockService,
        rebuild_pool: Arc<RebuildPool>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            locks,
            rebuild_pool,
            config,
        }
    }

    pub fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.config.entity_ttl_seconds)
    }

    pub fn logical_ttl(&self) -> Duration {
        Duration::from_secs(self.config.logical_ttl_seconds)
    }

    fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.config.null_ttl_seconds)
    }

    fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.config.lock_lease_seconds)
    }

    /// Write a full entry with a hard TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        self.store.set(key, &payload, Some(ttl)).await?;
        Ok(())
    }

    /// Write a full entry that never expires in the store but carries
    /// `now + ttl` as its logical expiry.
    pub async fn set_with_logical_expire<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expire_time = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = LogicalEntry {
            expire_time,
            data: value,
        };
        let payload = serde_json::to_string(&entry)?;
        self.store.set(key, &payload, None).await?;
        Ok(())
    }

    /// Drop a cached entry so the next read goes to the backing store.
    pub async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store.delete(key).await?)
    }

    async fn remember_missing(&self, key: &str) -> Result<(), CacheError> {
        self.store.set(key, EMPTY_MARKER, Some(self.null_ttl())).await?;
        debug!(key = %key, "Cached empty marker");
        Ok(())
    }

    /// Strategy A: blocking mutex rebuild.
    ///
    /// Returns `Ok(None)` when the backing store has no row. Lock contention
    /// is retried every `lock_retry_millis` up to `lock_max_retries` times.
    pub async fn query_with_mutex<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        fallback: F,
        ttl: Duration,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        ID: Display + Clone,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let key = cache_key::entity(prefix, &id);
        let retry = Duration::from_millis(self.config.lock_retry_millis);
        let max_retries = self.config.lock_max_retries;

        for attempt in 0..=max_retries {
            if let Some(found) = self.read_entry::<T>(&key, MUTEX).await? {
                return Ok(found);
            }

            let lock = self.locks.lock(&key);
            if !lock.try_acquire(self.lock_lease()).await? {
                debug!(key = %key, attempt, "Rebuild lock busy, retrying");
                tokio::time::sleep(retry).await;
                continue;
            }

            let result = self.rebuild_under_lock(&key, id.clone(), &fallback, ttl).await;
            release_quietly(&lock).await;
            return result;
        }

        let attempts = total_attempts(max_retries);
        warn!(key = %key, attempts, "Gave up waiting for rebuild lock");
        record_cache_lookup(MUTEX, "contention");
        Err(CacheError::LockContention {
            key,
            attempts,
        })
    }

    /// `Some(Some(v))` on a hit, `Some(None)` on the empty marker, `None` on a miss.
    async fn read_entry<T: DeserializeOwned>(
        &self,
        key: &str,
        strategy: &str,
    ) -> Result<Option<Option<T>>, CacheError> {
        match self.store.get(key).await? {
            Some(raw) if raw == EMPTY_MARKER => {
                debug!(key = %key, "Cache empty marker hit");
                record_cache_lookup(strategy, "empty");
                Ok(Some(None))
            }
            Some(raw) => {
                debug!(key = %key, "Cache hit");
                record_cache_lookup(strategy, "hit");
                Ok(Some(Some(serde_json::from_str(&raw)?)))
            }
            None => Ok(None),
        }
    }

    async fn rebuild_under_lock<T, ID, F, Fut>(
        &self,
        key: &str,
        id: ID,
        fallback: &F,
        ttl: Duration,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        // Another holder may have finished between our miss and our acquire.
        if let Some(found) = self.read_entry::<T>(key, MUTEX).await? {
            return Ok(found);
        }

        record_cache_lookup(MUTEX, "miss");
        let loaded = match fallback(id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(key = %key, error = %e, "Backing store lookup failed during rebuild");
                record_cache_rebuild(MUTEX, false);
                return Err(CacheError::Backend(e));
            }
        };

        match &loaded {
            Some(value) => self.set(key, value, ttl).await?,
            None => self.remember_missing(key).await?,
        }
        record_cache_rebuild(MUTEX, true);
        Ok(loaded)
    }

    /// Strategy B: logical expiration.
    ///
    /// A key that is not cached at all is reported as `Ok(None)` without
    /// touching the backing store; hot keys must be warmed first. An expired
    /// entry is returned as-is while at most one rebuild runs in the pool.
    pub async fn query_with_logical_expire<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        fallback: F,
        ttl: Duration,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        ID: Display + Send + 'static,
        F: Fn(ID) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        let key = cache_key::entity(prefix, &id);

        let raw = match self.store.get(&key).await? {
            Some(raw) => raw,
            None => {
                record_cache_lookup(LOGICAL, "miss");
                return Ok(None);
            }
        };
        if raw == EMPTY_MARKER {
            record_cache_lookup(LOGICAL, "empty");
            return Ok(None);
        }

        let entry: LogicalEntry<T> = serde_json::from_str(&raw)?;
        if !entry.is_expired(Utc::now()) {
            record_cache_lookup(LOGICAL, "hit");
            return Ok(Some(entry.data));
        }
        record_cache_lookup(LOGICAL, "stale");

        let lock = self.locks.lock(&key);
        match lock.try_acquire(self.lock_lease()).await {
            Ok(true) => self.spawn_rebuild(key, id, fallback, ttl, lock).await,
            Ok(false) => debug!(key = %key, "Rebuild already in progress"),
            Err(e) => warn!(key = %key, error = %e, "Could not take rebuild lock, serving stale"),
        }

        Ok(Some(entry.data))
    }

    async fn spawn_rebuild<T, ID, F, Fut>(
        &self,
        key: String,
        id: ID,
        fallback: F,
        ttl: Duration,
        lock: DistributedLock,
    ) where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        ID: Send + 'static,
        F: Fn(ID) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        // Skip when the previous holder refreshed the entry just before we locked.
        if let Ok(Some(raw)) = self.store.get(&key).await {
            let fresh = serde_json::from_str::<LogicalEntry<T>>(&raw)
                .map(|entry| !entry.is_expired(Utc::now()))
                .unwrap_or(false);
            if fresh {
                release_quietly(&lock).await;
                return;
            }
        }

        let client = self.clone();
        let task_key = key.clone();
        let held = lock.clone();
        let task = async move {
            let outcome = match fallback(id).await {
                Ok(Some(value)) => client.set_with_logical_expire(&task_key, &value, ttl).await,
                Ok(None) => client.remember_missing(&task_key).await,
                Err(e) => Err(CacheError::Backend(e)),
            };
            match outcome {
                Ok(()) => {
                    debug!(key = %task_key, "Logical entry rebuilt");
                    record_cache_rebuild(LOGICAL, true);
                }
                Err(e) => {
                    error!(key = %task_key, error = %e, "Logical rebuild failed");
                    record_cache_rebuild(LOGICAL, false);
                }
            }
            release_quietly(&lock).await;
        }
        .boxed();

        if !self.rebuild_pool.submit(task) {
            warn!(key = %key, "Rebuild refused by pool, releasing lock");
            release_quietly(&held).await;
        }
    }

    /// Load a row and store it as a logical-expiry entry. Returns false when
    /// the backing store has no such row.
    pub async fn warm_logical<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        ttl: Duration,
        fallback: F,
    ) -> Result<bool, CacheError>
    where
        T: Serialize,
        ID: Display + Clone,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let key = cache_key::entity(prefix, &id);
        match fallback(id).await.map_err(CacheError::Backend)? {
            Some(value) => {
                self.set_with_logical_expire(&key, &value, ttl).await?;
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Warmed logical entry");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// First read plus every retry.
fn total_attempts(max_retries: u32) -> u32 {
    max_retries.saturating_add(1)
}

async fn release_quietly(lock: &DistributedLock) {
    if let Err(e) = lock.release().await {
        warn!(lock = %lock.name(), error = %e, "Failed to release lock");
    }
}
