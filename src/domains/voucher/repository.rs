// ============================================================================
// VOUCHER REPOSITORY
// ============================================================================
// Durable side of the seckill pipeline. `persist_order` is the safety net
// behind the KV admission gate: the decrement only succeeds while
// `stock > 0`, and `(user_id, voucher_id)` is unique in `voucher_orders`.
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;

use super::models::{OrderIntent, PersistOutcome, SeckillVoucher, VoucherOrder};

#[async_trait]
pub trait VoucherRepository: Send + Sync {
    async fn find_seckill_voucher(&self, voucher_id: i64) -> anyhow::Result<Option<SeckillVoucher>>;

    async fn insert_seckill_voucher(&self, voucher: &SeckillVoucher) -> anyhow::Result<()>;

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> anyhow::Result<i64>;

    /// Conditional stock decrement and order insert in one transaction.
    async fn persist_order(&self, intent: &OrderIntent) -> anyhow::Result<PersistOutcome>;
}

pub struct PgVoucherRepository {
    pool: PgPool,
}

impl PgVoucherRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoucherRepository for PgVoucherRepository {
    async fn find_seckill_voucher(&self, voucher_id: i64) -> anyhow::Result<Option<SeckillVoucher>> {
        let voucher = sqlx::query_as::<_, SeckillVoucher>(
            r#"
            SELECT voucher_id, stock, begin_time, end_time, created_at, updated_at
            FROM seckill_vouchers
            WHERE voucher_id = $1
            "#,
        )
        .bind(voucher_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    async fn insert_seckill_voucher(&self, voucher: &SeckillVoucher) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seckill_vouchers (voucher_id, stock, begin_time, end_time, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (voucher_id) DO UPDATE
            SET stock = EXCLUDED.stock,
                begin_time = EXCLUDED.begin_time,
                end_time = EXCLUDED.end_time,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(voucher.voucher_id)
        .bind(voucher.stock)
        .bind(voucher.begin_time)
        .bind(voucher.end_time)
        .bind(voucher.created_at)
        .bind(voucher.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM voucher_orders WHERE user_id = $1 AND voucher_id = $2"#,
        )
        .bind(user_id)
        .bind(voucher_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn persist_order(&self, intent: &OrderIntent) -> anyhow::Result<PersistOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM voucher_orders WHERE user_id = $1 AND voucher_id = $2"#,
        )
        .bind(intent.user_id)
        .bind(intent.voucher_id)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            tx.rollback().await?;
            return Ok(PersistOutcome::Duplicate);
        }

        let decremented = sqlx::query(
            r#"
            UPDATE seckill_vouchers
            SET stock = stock - 1, updated_at = NOW()
            WHERE voucher_id = $1 AND stock > 0
            "#,
        )
        .bind(intent.voucher_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if decremented == 0 {
            tx.rollback().await?;
            return Ok(PersistOutcome::OutOfStock);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO voucher_orders (id, user_id, voucher_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, voucher_id) DO NOTHING
            "#,
        )
        .bind(intent.order_id)
        .bind(intent.user_id)
        .bind(intent.voucher_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            tx.rollback().await?;
            return Ok(PersistOutcome::Duplicate);
        }

        tx.commit().await?;
        debug!(order_id = intent.order_id, "Voucher order committed");
        Ok(PersistOutcome::Persisted)
    }
}

#[derive(Default)]
struct Tables {
    vouchers: HashMap<i64, SeckillVoucher>,
    orders: HashMap<(i64, i64), VoucherOrder>,
}

/// Process-local voucher tables. One mutex covers both tables so
/// `persist_order` is as atomic as the SQL transaction.
#[derive(Default)]
pub struct InMemoryVoucherRepository {
    tables: Mutex<Tables>,
}

impl InMemoryVoucherRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stock_of(&self, voucher_id: i64) -> Option<i32> {
        self.tables.lock().vouchers.get(&voucher_id).map(|v| v.stock)
    }

    pub fn orders(&self) -> Vec<VoucherOrder> {
        let mut orders: Vec<_> = self.tables.lock().orders.values().cloned().collect();
        orders.sort_by_key(|o| o.id);
        orders
    }
}

#[async_trait]
impl VoucherRepository for InMemoryVoucherRepository {
    async fn find_seckill_voucher(&self, voucher_id: i64) -> anyhow::Result<Option<SeckillVoucher>> {
        Ok(self.tables.lock().vouchers.get(&voucher_id).cloned())
    }

    async fn insert_seckill_voucher(&self, voucher: &SeckillVoucher) -> anyhow::Result<()> {
        self.tables.lock().vouchers.insert(voucher.voucher_id, voucher.clone());
        Ok(())
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> anyhow::Result<i64> {
        let tables = self.tables.lock();
        Ok(tables.orders.contains_key(&(user_id, voucher_id)) as i64)
    }

    async fn persist_order(&self, intent: &OrderIntent) -> anyhow::Result<PersistOutcome> {
        let mut tables = self.tables.lock();
        let pair = (intent.user_id, intent.voucher_id);
        if tables.orders.contains_key(&pair) {
            return Ok(PersistOutcome::Duplicate);
        }

        match tables.vouchers.get_mut(&intent.voucher_id) {
            Some(voucher) if voucher.stock > 0 => {
                voucher.stock -= 1;
                voucher.updated_at = Utc::now();
            }
            _ => return Ok(PersistOutcome::OutOfStock),
        }

        tables.orders.insert(
            pair,
            VoucherOrder {
                id: intent.order_id,
                user_id: intent.user_id,
                voucher_id: intent.voucher_id,
                created_at: Utc::now(),
            },
        );
        Ok(PersistOutcome::Persisted)
    }
}
