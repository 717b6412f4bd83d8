use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::AppError;

use crate::cache::CacheError;
use crate::services::IdError;
use crate::store::KvError;

/// Flash-sale voucher. `stock` in this row is the durable count; the
/// admission gate works on its own copy in the KV store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeckillVoucher {
    pub voucher_id: i64,
    pub stock: i32,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeckillVoucher {
    /// Reject purchases outside `[begin_time, end_time]`.
    pub fn check_window(&self, now: DateTime<Utc>) -> Result<(), SeckillError> {
        if now < self.begin_time {
            return Err(SeckillError::NotStarted);
        }
        if now > self.end_time {
            return Err(SeckillError::Ended);
        }
        Ok(())
    }
}

/// Body of `POST /voucher/seckill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSeckillVoucher {
    pub voucher_id: i64,
    pub stock: i32,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl PublishSeckillVoucher {
    pub fn validate(&self) -> Result<(), SeckillError> {
        if self.stock < 0 {
            return Err(SeckillError::InvalidVoucher("stock must not be negative".into()));
        }
        if self.end_time <= self.begin_time {
            return Err(SeckillError::InvalidVoucher("end_time must be after begin_time".into()));
        }
        Ok(())
    }

    pub fn into_voucher(self, now: DateTime<Utc>) -> SeckillVoucher {
        SeckillVoucher {
            voucher_id: self.voucher_id,
            stock: self.stock,
            begin_time: self.begin_time,
            end_time: self.end_time,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Admitted purchase waiting for the order processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub order_id: i64,
    pub voucher_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoucherOrder {
    pub id: i64,
    pub user_id: i64,
    pub voucher_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of the transactional decrement-and-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    Duplicate,
    OutOfStock,
}

#[derive(Debug, thiserror::Error)]
pub enum SeckillError {
    #[error("seckill voucher {0} does not exist")]
    VoucherNotFound(i64),

    #[error("seckill has not started")]
    NotStarted,

    #[error("seckill has ended")]
    Ended,

    #[error("sold out")]
    StockEmpty,

    #[error("already purchased")]
    LimitExceeded,

    #[error("order queue is full, try again")]
    Busy,

    #[error("invalid voucher: {0}")]
    InvalidVoucher(String),

    #[error("admission store error: {0}")]
    Store(#[from] KvError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("voucher repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl SeckillError {
    /// Label used for the admission metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::VoucherNotFound(_) => "not_found",
            Self::NotStarted => "not_started",
            Self::Ended => "ended",
            Self::StockEmpty => "stock_empty",
            Self::LimitExceeded => "limit_exceeded",
            Self::Busy => "busy",
            Self::InvalidVoucher(_) => "invalid",
            Self::Store(_) | Self::Id(_) | Self::Cache(_) | Self::Repository(_) => "error",
        }
    }
}

impl From<SeckillError> for AppError {
    fn from(err: SeckillError) -> Self {
        match err {
            SeckillError::VoucherNotFound(id) => AppError::not_found(format!("seckill voucher {}", id)),
            SeckillError::NotStarted | SeckillError::Ended => AppError::bad_request(err.to_string()),
            SeckillError::StockEmpty => AppError::sold_out(err.to_string()),
            SeckillError::LimitExceeded => AppError::conflict(err.to_string()),
            SeckillError::Busy => AppError::service_unavailable("order queue"),
            SeckillError::InvalidVoucher(message) => AppError::validation(message),
            SeckillError::Store(e) => AppError::service_unavailable(format!("kv store: {}", e)),
            SeckillError::Id(e) => AppError::internal(e.to_string()),
            SeckillError::Cache(e) => e.into(),
            SeckillError::Repository(e) => AppError::Generic(e),
        }
    }
}
