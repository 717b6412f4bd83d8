//! In-process [`KvStore`] used by tests and single-node development.
//!
//! Every operation, including the scripted ones, runs under a single
//! `parking_lot::Mutex`, which gives the same atomicity the Lua scripts get
//! from Redis. Expiry is tracked with `tokio::time::Instant`, so tests can
//! drive TTLs with `tokio::time::pause` / `advance`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

use super::kv_store::{AdmissionCode, KvError, KvResult, KvStore};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

#[derive(Default)]
pub struct InMemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop `key` when expired and return the live entry, if any.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn read_i64(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> KvResult<Option<i64>> {
    match live_entry(entries, key, now) {
        None => Ok(None),
        Some(Entry { value: Value::Str(s), .. }) => Ok(s.parse().ok()),
        Some(_) => Err(KvError::WrongType { key: key.to_string() }),
    }
}

/// INCRBY semantics: missing keys start at 0 and the TTL is preserved.
fn add_i64(entries: &mut HashMap<String, Entry>, key: &str, delta: i64, now: Instant) -> KvResult<i64> {
    match live_entry(entries, key, now) {
        Some(Entry { value: Value::Str(s), .. }) => {
            let current: i64 = s
                .parse()
                .map_err(|_| KvError::WrongType { key: key.to_string() })?;
            let next = current + delta;
            *s = next.to_string();
            Ok(next)
        }
        Some(_) => Err(KvError::WrongType { key: key.to_string() }),
        None => {
            entries.insert(
                key.to_string(),
                Entry { value: Value::Str(delta.to_string()), expires_at: None },
            );
            Ok(delta)
        }
    }
}

fn set_contains(entries: &mut HashMap<String, Entry>, key: &str, member: &str, now: Instant) -> KvResult<bool> {
    match live_entry(entries, key, now) {
        None => Ok(false),
        Some(Entry { value: Value::Set(set), .. }) => Ok(set.contains(member)),
        Some(_) => Err(KvError::WrongType { key: key.to_string() }),
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock();
        match live_entry(&mut entries, key, Instant::now()) {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(KvError::WrongType { key: key.to_string() }),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.lock().insert(
            key.to_string(),
            Entry { value: Value::Str(value.to_string()), expires_at },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if live_entry(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry { value: Value::Str(value.to_string()), expires_at: Some(now + ttl) },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut entries = self.entries.lock();
        add_i64(&mut entries, key, 1, Instant::now())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let matches = matches!(
            live_entry(&mut entries, key, now),
            Some(Entry { value: Value::Str(s), .. }) if *s == expected
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn set_is_member(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut entries = self.entries.lock();
        set_contains(&mut entries, key, member, Instant::now())
    }

    async fn seckill_reserve(
        &self,
        stock_key: &str,
        ordered_key: &str,
        user_id: &str,
    ) -> KvResult<AdmissionCode> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let stock = read_i64(&mut entries, stock_key, now)?;
        if stock.map_or(true, |stock| stock < 1) {
            return Ok(AdmissionCode::StockEmpty);
        }
        if set_contains(&mut entries, ordered_key, user_id, now)? {
            return Ok(AdmissionCode::LimitExceeded);
        }

        add_i64(&mut entries, stock_key, -1, now)?;
        match live_entry(&mut entries, ordered_key, now) {
            Some(Entry { value: Value::Set(set), .. }) => {
                set.insert(user_id.to_string());
            }
            Some(_) => return Err(KvError::WrongType { key: ordered_key.to_string() }),
            None => {
                entries.insert(
                    ordered_key.to_string(),
                    Entry {
                        value: Value::Set(HashSet::from([user_id.to_string()])),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(AdmissionCode::Ok)
    }

    async fn seckill_release(
        &self,
        stock_key: &str,
        ordered_key: &str,
        user_id: &str,
    ) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let removed = match live_entry(&mut entries, ordered_key, now) {
            Some(Entry { value: Value::Set(set), .. }) => set.remove(user_id),
            Some(_) => return Err(KvError::WrongType { key: ordered_key.to_string() }),
            None => false,
        };
        if removed {
            add_i64(&mut entries, stock_key, 1, now)?;
        }
        Ok(removed)
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}
