use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::AppError;

use crate::cache::CacheError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub type_id: i64,
    pub images: String,
    pub area: Option<String>,
    pub address: String,
    pub x: f64,
    pub y: f64,
    pub avg_price: Option<i64>,
    pub sold: i32,
    pub comments: i32,
    pub score: i32,
    pub open_hours: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `PUT /shop`. Counters (`sold`, `comments`, `score`) are owned by
/// other flows and cannot be edited here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopUpdate {
    pub id: Option<i64>,
    pub name: String,
    pub type_id: i64,
    pub images: String,
    pub area: Option<String>,
    pub address: String,
    pub x: f64,
    pub y: f64,
    pub avg_price: Option<i64>,
    pub open_hours: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("shop {0} does not exist")]
    NotFound(i64),

    #[error("shop id is required")]
    MissingId,

    #[error("shop name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("shop repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::NotFound(id) => AppError::not_found(format!("shop {}", id)),
            ShopError::MissingId | ShopError::EmptyName => AppError::validation(err.to_string()),
            ShopError::Cache(e) => e.into(),
            ShopError::Repository(e) => AppError::Generic(e),
        }
    }
}
