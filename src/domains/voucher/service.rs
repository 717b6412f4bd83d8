use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use super::admission::AdmissionController;
use super::models::{OrderIntent, PublishSeckillVoucher, SeckillError, SeckillVoucher};
use super::order_processor::OrderQueue;
use super::repository::VoucherRepository;
use crate::cache::CacheClient;
use crate::cache_key::{self, SECKILL_VOUCHER_PREFIX};
use crate::observability::record_seckill_admission;
use crate::services::RedisIdWorker;
use crate::store::AdmissionCode;

const ORDER_SEQUENCE: &str = "order";

/// Request-side half of the seckill pipeline: window check, atomic
/// admission, id assignment and hand-off to the order queue.
pub struct SeckillService {
    repo: Arc<dyn VoucherRepository>,
    cache: CacheClient,
    admission: AdmissionController,
    ids: RedisIdWorker,
    queue: OrderQueue,
}

impl SeckillService {
    pub fn new(
        repo: Arc<dyn VoucherRepository>,
        cache: CacheClient,
        admission: AdmissionController,
        ids: RedisIdWorker,
        queue: OrderQueue,
    ) -> Self {
        Self {
            repo,
            cache,
            admission,
            ids,
            queue,
        }
    }

    /// Admit `user_id` and return the order id. The order itself is written
    /// later by the order processor.
    pub async fn seckill_voucher(&self, voucher_id: i64, user_id: i64) -> Result<i64, SeckillError> {
        let result = self.admit_and_enqueue(voucher_id, user_id).await;
        match &result {
            Ok(order_id) => {
                record_seckill_admission("ok");
                info!(voucher_id, user_id, order_id, "Seckill order queued");
            }
            Err(e) => {
                record_seckill_admission(e.outcome());
                info!(voucher_id, user_id, reason = e.outcome(), "Seckill request rejected");
            }
        }
        result
    }

    async fn admit_and_enqueue(&self, voucher_id: i64, user_id: i64) -> Result<i64, SeckillError> {
        let voucher = self
            .cache
            .query_with_mutex(
                SECKILL_VOUCHER_PREFIX,
                voucher_id,
                |id| self.repo.find_seckill_voucher(id),
                self.cache.entity_ttl(),
            )
            .await?
            .ok_or(SeckillError::VoucherNotFound(voucher_id))?;
        voucher.check_window(Utc::now())?;

        match self.admission.admit(voucher_id, user_id).await? {
            AdmissionCode::Ok => {}
            AdmissionCode::StockEmpty => return Err(SeckillError::StockEmpty),
            AdmissionCode::LimitExceeded => return Err(SeckillError::LimitExceeded),
        }

        let order_id = match self.ids.next_id(ORDER_SEQUENCE).await {
            Ok(id) => id,
            Err(e) => {
                self.compensate(voucher_id, user_id).await;
                return Err(e.into());
            }
        };

        let intent = OrderIntent {
            order_id,
            voucher_id,
            user_id,
        };
        if self.queue.try_enqueue(intent).is_err() {
            self.compensate(voucher_id, user_id).await;
            return Err(SeckillError::Busy);
        }

        Ok(order_id)
    }

    /// Give the reserved unit back when the intent could not be queued.
    async fn compensate(&self, voucher_id: i64, user_id: i64) {
        if let Err(e) = self.admission.release(voucher_id, user_id).await {
            error!(voucher_id, user_id, error = %e, "Failed to release seckill reservation");
        }
    }

    /// Store the voucher row and load its stock into the admission gate.
    pub async fn publish_seckill_voucher(
        &self,
        request: PublishSeckillVoucher,
    ) -> Result<SeckillVoucher, SeckillError> {
        request.validate()?;
        let voucher = request.into_voucher(Utc::now());

        self.repo.insert_seckill_voucher(&voucher).await?;
        self.admission.load_stock(voucher.voucher_id, voucher.stock).await?;
        self.cache
            .invalidate(&cache_key::entity(SECKILL_VOUCHER_PREFIX, voucher.voucher_id))
            .await?;

        info!(voucher_id = voucher.voucher_id, stock = voucher.stock, "Seckill voucher published");
        Ok(voucher)
    }
}
