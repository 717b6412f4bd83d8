use shared::Config;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::CacheClient;
use crate::domains::shop::{PgShopRepository, ShopRepository, ShopService};
use crate::domains::voucher::{
    order_channel, AdmissionController, OrderProcessor, PgVoucherRepository, SeckillService,
    VoucherRepository,
};
use crate::optimization::{create_optimized_db_pool, create_redis_pool};
use crate::services::{LockService, RebuildPool, RedisIdWorker};
use crate::store::{KvStore, RedisKvStore};

/// Shared application state.
/// Every component is built once here and handed to the handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KvStore>,
    pub db_pool: Option<PgPool>,
    pub ids: RedisIdWorker,
    pub shop_service: ShopService,
    pub seckill_service: SeckillService,
}

/// Background work owned by the process: the order processor and the
/// cache rebuild pool.
pub struct BackgroundTasks {
    shutdown_tx: watch::Sender<bool>,
    order_processor: JoinHandle<()>,
    rebuild_pool: Arc<RebuildPool>,
}

impl BackgroundTasks {
    /// Drain the order queue, then the rebuild pool.
    pub async fn shutdown(self) {
        info!("Stopping background tasks");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.order_processor.await {
            warn!("Order processor ended abnormally: {}", e);
        }
        self.rebuild_pool.shutdown().await;
        info!("Background tasks stopped");
    }
}

impl AppState {
    /// Connect to Postgres and Redis and build the full state.
    pub async fn connect(config: Config) -> anyhow::Result<(Arc<Self>, BackgroundTasks)> {
        let db_pool = create_optimized_db_pool(&config.database).await?;
        let redis_pool = create_redis_pool(&config.redis)?;

        let store: Arc<dyn KvStore> = Arc::new(RedisKvStore::new(redis_pool));
        store
            .ping()
            .await
            .map_err(|e| anyhow::anyhow!("Redis is not reachable: {}", e))?;

        let shops: Arc<dyn ShopRepository> = Arc::new(PgShopRepository::new(db_pool.clone()));
        let vouchers: Arc<dyn VoucherRepository> = Arc::new(PgVoucherRepository::new(db_pool.clone()));

        Ok(Self::assemble(config, store, Some(db_pool), shops, vouchers))
    }

    /// Wire the components on top of already-built stores. Must be called
    /// inside a Tokio runtime; spawns the order processor and rebuild workers.
    pub fn assemble(
        config: Config,
        store: Arc<dyn KvStore>,
        db_pool: Option<PgPool>,
        shops: Arc<dyn ShopRepository>,
        vouchers: Arc<dyn VoucherRepository>,
    ) -> (Arc<Self>, BackgroundTasks) {
        let workers = match config.cache.rebuild_workers {
            0 => num_cpus::get().clamp(1, 4),
            n => n,
        };
        let rebuild_pool = Arc::new(RebuildPool::new(workers, config.cache.rebuild_queue_capacity));
        info!("🧱 Cache rebuild pool started with {} workers", workers);

        let locks = LockService::new(Arc::clone(&store));
        let ids = RedisIdWorker::new(Arc::clone(&store));
        let cache = CacheClient::new(
            Arc::clone(&store),
            locks.clone(),
            Arc::clone(&rebuild_pool),
            config.cache.clone(),
        );

        let (queue, receiver) = order_channel(config.seckill.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let order_processor = OrderProcessor::new(
            Arc::clone(&vouchers),
            locks,
            Duration::from_secs(config.seckill.order_lock_lease_seconds),
        )
        .spawn(receiver, shutdown_rx);

        let shop_service = ShopService::new(shops, cache.clone());
        let seckill_service = SeckillService::new(
            vouchers,
            cache,
            AdmissionController::new(Arc::clone(&store)),
            ids.clone(),
            queue,
        );

        let state = Arc::new(Self {
            config,
            store,
            db_pool,
            ids,
            shop_service,
            seckill_service,
        });
        let background = BackgroundTasks {
            shutdown_tx,
            order_processor,
            rebuild_pool,
        };
        (state, background)
    }
}
