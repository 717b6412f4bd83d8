pub mod id_worker;
pub mod rebuild_pool;
pub mod redis_lock;

pub use id_worker::{IdError, RedisIdWorker};
pub use rebuild_pool::{RebuildPool, RebuildTask};
pub use redis_lock::{DistributedLock, LockError, LockService};
