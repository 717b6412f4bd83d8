#![allow(dead_code)]

use chrono::{Duration, Utc};
use shared::Config;
use shopreview_ws::domains::shop::{InMemoryShopRepository, Shop};
use shopreview_ws::domains::voucher::{InMemoryVoucherRepository, PublishSeckillVoucher};
use shopreview_ws::state::{AppState, BackgroundTasks};
use shopreview_ws::store::InMemoryKvStore;
use std::sync::Arc;

pub struct TestApp {
    pub state: Arc<AppState>,
    pub background: BackgroundTasks,
    pub store: Arc<InMemoryKvStore>,
    pub shops: Arc<InMemoryShopRepository>,
    pub vouchers: Arc<InMemoryVoucherRepository>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.cache.rebuild_workers = 2;
    config.cache.lock_retry_millis = 5;
    config.seckill.queue_capacity = 1024;
    config
}

pub fn spawn_app(config: Config) -> TestApp {
    let store = Arc::new(InMemoryKvStore::new());
    let shops = Arc::new(InMemoryShopRepository::new());
    let vouchers = Arc::new(InMemoryVoucherRepository::new());
    let (state, background) =
        AppState::assemble(config, store.clone(), None, shops.clone(), vouchers.clone());
    TestApp {
        state,
        background,
        store,
        shops,
        vouchers,
    }
}

pub fn open_voucher(voucher_id: i64, stock: i32) -> PublishSeckillVoucher {
    let now = Utc::now();
    PublishSeckillVoucher {
        voucher_id,
        stock,
        begin_time: now - Duration::hours(1),
        end_time: now + Duration::hours(1),
    }
}

pub fn shop(id: i64, name: &str) -> Shop {
    let now = Utc::now();
    Shop {
        id,
        name: name.to_string(),
        type_id: 1,
        images: "https://img.example/1.jpg".to_string(),
        area: Some("Riverside".to_string()),
        address: "88 Harbor Road".to_string(),
        x: 120.15,
        y: 30.28,
        avg_price: Some(60),
        sold: 1200,
        comments: 340,
        score: 46,
        open_hours: Some("10:00-22:00".to_string()),
        created_at: now,
        updated_at: now,
    }
}
