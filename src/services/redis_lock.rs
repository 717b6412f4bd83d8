// ============================================================================
// DISTRIBUTED LOCK
// ============================================================================
// Named lease on `lock:{name}` shared by every service instance.
//
// Acquire: SET NX PX with a token unique to this handle.
// Release: compare-and-delete script, so a caller can never remove a lease
// that expired and was taken by someone else.
//
// Known limitation: there is no watchdog. A holder that runs past its lease
// loses the lock silently and another caller may enter the critical section.
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache_key;
use crate::observability::record_lock_operation;
use crate::store::{KvError, KvStore};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock store error: {0}")]
    Store(#[from] KvError),
}

/// Hands out lock handles tagged with this process's instance id.
#[derive(Clone)]
pub struct LockService {
    store: Arc<dyn KvStore>,
    instance_id: String,
}

impl LockService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            instance_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Create a handle for `name`. Nothing is acquired until `try_acquire`.
    pub fn lock(&self, name: &str) -> DistributedLock {
        DistributedLock {
            store: Arc::clone(&self.store),
            name: name.to_string(),
            key: cache_key::lock(name),
            token: format!("{}-{}", self.instance_id, Uuid::new_v4().simple()),
        }
    }
}

/// One logical owner of a named lock. Handles created by
/// [`LockService::lock`] never share a token, even inside one process;
/// clones of a handle are the same owner.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KvStore>,
    name: String,
    key: String,
    token: String,
}

impl DistributedLock {
    /// Single attempt, no waiting. Returns false when someone else holds it.
    pub async fn try_acquire(&self, lease: Duration) -> Result<bool, LockError> {
        let acquired = self.store.set_nx(&self.key, &self.token, lease).await?;
        record_lock_operation("acquire", acquired);
        if acquired {
            debug!(lock = %self.name, lease_ms = lease.as_millis() as u64, "Lock acquired");
        } else {
            debug!(lock = %self.name, "Lock busy");
        }
        Ok(acquired)
    }

    /// Release the lease if this handle still owns it. Returns false (and
    /// changes nothing) when the lease expired or belongs to another token.
    pub async fn release(&self) -> Result<bool, LockError> {
        let released = self.store.compare_and_delete(&self.key, &self.token).await?;
        record_lock_operation("release", released);
        if released {
            debug!(lock = %self.name, "Lock released");
        } else {
            warn!(lock = %self.name, "Lock release skipped: lease expired or owned by another holder");
        }
        Ok(released)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryKvStore;

    fn service() -> (Arc<InMemoryKvStore>, LockService) {
        let store = Arc::new(InMemoryKvStore::new());
        let locks = LockService::new(store.clone());
        (store, locks)
    }

    #[tokio::test]
    async fn test_second_handle_cannot_acquire_held_lock() {
        let (_store, locks) = service();
        let first = locks.lock("order:1");
        let second = locks.lock("order:1");

        assert!(first.try_acquire(Duration::from_secs(10)).await.unwrap());
        assert!(!second.try_acquire(Duration::from_secs(10)).await.unwrap());

        assert!(first.release().await.unwrap());
        assert!(second.try_acquire(Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_with_foreign_token_is_noop() {
        let (store, locks) = service();
        let owner = locks.lock("rebuild:x");
        let other = locks.lock("rebuild:x");
        assert_ne!(owner.token(), other.token());

        assert!(owner.try_acquire(Duration::from_secs(10)).await.unwrap());
        assert!(!other.release().await.unwrap());
        assert_eq!(
            store.get("lock:rebuild:x").await.unwrap().as_deref(),
            Some(owner.token())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_cannot_be_released_by_old_owner() {
        let (store, locks) = service();
        let stale = locks.lock("order:9");
        let fresh = locks.lock("order:9");

        assert!(stale.try_acquire(Duration::from_secs(1)).await.unwrap());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(fresh.try_acquire(Duration::from_secs(10)).await.unwrap());

        assert!(!stale.release().await.unwrap());
        assert_eq!(
            store.get("lock:order:9").await.unwrap().as_deref(),
            Some(fresh.token())
        );
    }

    #[test]
    fn test_tokens_carry_instance_id() {
        let (_store, locks) = service();
        let lock = locks.lock("a");
        assert!(lock.token().starts_with(locks.instance_id()));
        assert_eq!(lock.name(), "a");
    }
}
