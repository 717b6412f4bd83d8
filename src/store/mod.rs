pub mod kv_store;
pub mod memory_store;
pub mod redis_store;

pub use kv_store::{AdmissionCode, KvError, KvResult, KvStore};
pub use memory_store::InMemoryKvStore;
pub use redis_store::RedisKvStore;
