// ============================================================================
// SECKILL ADMISSION
// ============================================================================
// The only writer of `seckill:stock:{voucher}` and `seckill:order:{voucher}`.
// Every check-and-reserve runs as one atomic script, so the number of OK
// admissions can never exceed the loaded stock and a user is admitted at
// most once per voucher.
// ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache_key;
use crate::store::{AdmissionCode, KvResult, KvStore};

#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn KvStore>,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Publish the stock the gate hands out for `voucher_id`.
    pub async fn load_stock(&self, voucher_id: i64, stock: i32) -> KvResult<()> {
        self.store
            .set(&cache_key::seckill_stock(voucher_id), &stock.to_string(), None)
            .await?;
        info!(voucher_id, stock, "Seckill stock loaded");
        Ok(())
    }

    /// Reserve one unit for `user_id`.
    pub async fn admit(&self, voucher_id: i64, user_id: i64) -> KvResult<AdmissionCode> {
        let code = self
            .store
            .seckill_reserve(
                &cache_key::seckill_stock(voucher_id),
                &cache_key::seckill_ordered(voucher_id),
                &user_id.to_string(),
            )
            .await?;
        debug!(voucher_id, user_id, outcome = code.as_str(), "Admission decided");
        Ok(code)
    }

    /// Undo a reservation whose intent never reached the order queue.
    pub async fn release(&self, voucher_id: i64, user_id: i64) -> KvResult<bool> {
        let released = self
            .store
            .seckill_release(
                &cache_key::seckill_stock(voucher_id),
                &cache_key::seckill_ordered(voucher_id),
                &user_id.to_string(),
            )
            .await?;
        if !released {
            warn!(voucher_id, user_id, "No reservation to release");
        }
        Ok(released)
    }

    /// Units still available at the gate, if stock was ever loaded.
    pub async fn remaining(&self, voucher_id: i64) -> KvResult<Option<i64>> {
        let raw = self.store.get(&cache_key::seckill_stock(voucher_id)).await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }
}
