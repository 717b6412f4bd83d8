// ============================================================================
// ID GENERATOR
// ============================================================================
// 64-bit ids: high 32 bits are whole seconds since 2023-01-01T00:00:00Z,
// low 32 bits come from INCR on a per-sequence, per-day counter
// (`counter:{sequence}:{yyyy:MM:dd}`). Ids from one sequence increase
// strictly within a day and across days as long as the clock does not move
// backwards.
// ============================================================================

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::error;

use crate::cache_key;
use crate::observability::record_id_generated;
use crate::store::{KvError, KvStore};

/// 2023-01-01T00:00:00Z
pub const EPOCH_SECONDS: i64 = 1_672_531_200;

const COUNT_BITS: u32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("id counter unavailable: {0}")]
    Store(#[from] KvError),

    #[error("daily counter for sequence {sequence} exceeded 32 bits")]
    SequenceOverflow { sequence: String },

    #[error("clock is before the id epoch")]
    ClockBeforeEpoch,
}

#[derive(Clone)]
pub struct RedisIdWorker {
    store: Arc<dyn KvStore>,
}

impl RedisIdWorker {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn next_id(&self, sequence: &str) -> Result<i64, IdError> {
        self.next_id_at(sequence, Utc::now()).await
    }

    /// Same as [`next_id`](Self::next_id) with an explicit clock reading.
    pub async fn next_id_at(&self, sequence: &str, now: DateTime<Utc>) -> Result<i64, IdError> {
        let timestamp = now.timestamp() - EPOCH_SECONDS;
        if timestamp < 0 {
            return Err(IdError::ClockBeforeEpoch);
        }

        let date = now.format("%Y:%m:%d").to_string();
        let key = cache_key::id_counter(sequence, &date);
        let count = self.store.incr(&key).await?;

        if count > u32::MAX as i64 {
            error!(sequence = %sequence, count, "Daily id counter overflowed");
            return Err(IdError::SequenceOverflow {
                sequence: sequence.to_string(),
            });
        }

        record_id_generated(sequence);
        Ok((timestamp << COUNT_BITS) | count)
    }
}

/// Split an id back into (seconds since epoch, daily counter).
pub fn decompose(id: i64) -> (i64, u32) {
    (id >> COUNT_BITS, (id & u32::MAX as i64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryKvStore;
    use chrono::TimeZone;

    fn worker() -> (Arc<InMemoryKvStore>, RedisIdWorker) {
        let store = Arc::new(InMemoryKvStore::new());
        (store.clone(), RedisIdWorker::new(store))
    }

    #[tokio::test]
    async fn test_same_second_ids_differ_in_low_bits_only() {
        let (_store, worker) = worker();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        let a = worker.next_id_at("order", now).await.unwrap();
        let b = worker.next_id_at("order", now).await.unwrap();

        assert!(b > a);
        assert_eq!(a >> 32, b >> 32);
        assert_eq!(decompose(a), (now.timestamp() - EPOCH_SECONDS, 1));
        assert_eq!(decompose(b).1, 2);
    }

    #[tokio::test]
    async fn test_counter_is_namespaced_per_day_and_sequence() {
        let (store, worker) = worker();
        let day = Utc.with_ymd_and_hms(2026, 10, 16, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();

        worker.next_id_at("order", day).await.unwrap();
        worker.next_id_at("shop", day).await.unwrap();
        let first_tomorrow = worker.next_id_at("order", next_day).await.unwrap();

        assert_eq!(decompose(first_tomorrow).1, 1);
        assert_eq!(store.get("counter:order:2026:10:16").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("counter:shop:2026:10:16").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_counter_overflow_is_an_error() {
        let (store, worker) = worker();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        store
            .set("counter:order:2026:10:16", &(u32::MAX as i64).to_string(), None)
            .await
            .unwrap();

        let err = worker.next_id_at("order", now).await.unwrap_err();
        assert!(matches!(err, IdError::SequenceOverflow { .. }));
    }

    #[tokio::test]
    async fn test_clock_before_epoch_is_rejected() {
        let (_store, worker) = worker();
        let past = Utc.with_ymd_and_hms(2022, 12, 31, 23, 59, 59).unwrap();
        assert!(matches!(
            worker.next_id_at("order", past).await,
            Err(IdError::ClockBeforeEpoch)
        ));
    }
}
