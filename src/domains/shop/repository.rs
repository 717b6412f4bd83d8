// ============================================================================
// SHOP REPOSITORY
// ============================================================================
// Backing store for shops. The cache client only ever sees the
// `find_by_id` future; writes go straight to the table and the caller
// invalidates the cache afterwards.
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;

use super::models::{Shop, ShopUpdate};

#[async_trait]
pub trait ShopRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Shop>>;

    /// Returns false when no shop has `id`.
    async fn update(&self, id: i64, update: &ShopUpdate) -> anyhow::Result<bool>;
}

pub struct PgShopRepository {
    pool: PgPool,
}

impl PgShopRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopRepository for PgShopRepository {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>(
            r#"
            SELECT id, name, type_id, images, area, address, x, y,
                   avg_price, sold, comments, score, open_hours,
                   created_at, updated_at
            FROM shops
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shop)
    }

    async fn update(&self, id: i64, update: &ShopUpdate) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE shops
            SET name = $2, type_id = $3, images = $4, area = $5, address = $6,
                x = $7, y = $8, avg_price = $9, open_hours = $10,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.type_id)
        .bind(&update.images)
        .bind(&update.area)
        .bind(&update.address)
        .bind(update.x)
        .bind(update.y)
        .bind(update.avg_price)
        .bind(&update.open_hours)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Process-local shop table for tests and database-less development.
#[derive(Default)]
pub struct InMemoryShopRepository {
    shops: DashMap<i64, Shop>,
}

impl InMemoryShopRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, shop: Shop) {
        self.shops.insert(shop.id, shop);
    }
}

#[async_trait]
impl ShopRepository for InMemoryShopRepository {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Shop>> {
        Ok(self.shops.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, id: i64, update: &ShopUpdate) -> anyhow::Result<bool> {
        let Some(mut shop) = self.shops.get_mut(&id) else {
            return Ok(false);
        };
        shop.name = update.name.clone();
        shop.type_id = update.type_id;
        shop.images = update.images.clone();
        shop.area = update.area.clone();
        shop.address = update.address.clone();
        shop.x = update.x;
        shop.y = update.y;
        shop.avg_price = update.avg_price;
        shop.open_hours = update.open_hours.clone();
        shop.updated_at = Utc::now();
        Ok(true)
    }
}
