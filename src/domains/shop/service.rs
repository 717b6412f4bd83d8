use std::sync::Arc;
use tracing::{debug, info};

use super::models::{Shop, ShopError, ShopUpdate};
use super::repository::ShopRepository;
use crate::cache::CacheClient;
use crate::cache_key::{self, SHOP_HOT_PREFIX, SHOP_PREFIX};

/// Shop reads go through the cache; hot shops are served from logical-expiry
/// entries and everything else through the mutex rebuild.
pub struct ShopService {
    repo: Arc<dyn ShopRepository>,
    cache: CacheClient,
}

impl ShopService {
    pub fn new(repo: Arc<dyn ShopRepository>, cache: CacheClient) -> Self {
        Self { repo, cache }
    }

    pub async fn query_by_id(&self, id: i64) -> Result<Shop, ShopError> {
        let repo = Arc::clone(&self.repo);
        let hot = self
            .cache
            .query_with_logical_expire(
                SHOP_HOT_PREFIX,
                id,
                move |id| {
                    let repo = Arc::clone(&repo);
                    async move { repo.find_by_id(id).await }
                },
                self.cache.logical_ttl(),
            )
            .await?;
        if let Some(shop) = hot {
            return Ok(shop);
        }

        debug!(shop_id = id, "Shop not hot, using mutex rebuild");
        self.cache
            .query_with_mutex(
                SHOP_PREFIX,
                id,
                |id| self.repo.find_by_id(id),
                self.cache.entity_ttl(),
            )
            .await?
            .ok_or(ShopError::NotFound(id))
    }

    /// Write the row first, then drop both cache encodings so the next read
    /// repopulates from the table.
    pub async fn update(&self, update: ShopUpdate) -> Result<(), ShopError> {
        let id = update.id.ok_or(ShopError::MissingId)?;
        if update.name.trim().is_empty() {
            return Err(ShopError::EmptyName);
        }

        if !self.repo.update(id, &update).await? {
            return Err(ShopError::NotFound(id));
        }

        self.cache.invalidate(&cache_key::entity(SHOP_PREFIX, id)).await?;
        self.cache.invalidate(&cache_key::entity(SHOP_HOT_PREFIX, id)).await?;
        info!(shop_id = id, "Shop updated, cache invalidated");
        Ok(())
    }

    /// Load a shop into the hot namespace. Returns false for unknown ids.
    pub async fn warm_hot_shop(&self, id: i64) -> Result<bool, ShopError> {
        let warmed = self
            .cache
            .warm_logical(SHOP_HOT_PREFIX, id, self.cache.logical_ttl(), |id| {
                self.repo.find_by_id(id)
            })
            .await?;
        if warmed {
            info!(shop_id = id, "Hot shop warmed");
        }
        Ok(warmed)
    }
}
