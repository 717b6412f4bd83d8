// Lua scripts executed against a real Redis.
//
// Manual: needs a running server (REDIS_URL, default redis://127.0.0.1:6379).
//   cargo test --test redis_scripts -- --ignored

use shared::config::RedisConfig;
use shopreview_ws::optimization::create_redis_pool;
use shopreview_ws::store::{AdmissionCode, KvStore, RedisKvStore};
use std::time::Duration;
use uuid::Uuid;

fn redis_store() -> RedisKvStore {
    let mut config = RedisConfig::default();
    if let Ok(url) = std::env::var("REDIS_URL") {
        config.url = url;
    }
    RedisKvStore::new(create_redis_pool(&config).unwrap())
}

/// Keys unique to one run so parallel runs and leftovers never collide.
fn run_keys() -> (String, String) {
    let run = Uuid::new_v4();
    (
        format!("test:seckill:stock:{}", run),
        format!("test:seckill:order:{}", run),
    )
}

#[tokio::test]
#[ignore]
async fn test_seckill_script_enforces_stock_and_one_per_user() {
    let store = redis_store();
    let (stock, ordered) = run_keys();
    store.set(&stock, "1", Some(Duration::from_secs(60))).await.unwrap();

    assert_eq!(store.seckill_reserve(&stock, &ordered, "7").await.unwrap(), AdmissionCode::Ok);
    assert_eq!(
        store.seckill_reserve(&stock, &ordered, "7").await.unwrap(),
        AdmissionCode::StockEmpty
    );
    assert_eq!(store.get(&stock).await.unwrap().as_deref(), Some("0"));

    store.set(&stock, "5", Some(Duration::from_secs(60))).await.unwrap();
    assert_eq!(
        store.seckill_reserve(&stock, &ordered, "7").await.unwrap(),
        AdmissionCode::LimitExceeded
    );
    assert_eq!(store.get(&stock).await.unwrap().as_deref(), Some("5"));

    store.delete(&stock).await.unwrap();
    store.delete(&ordered).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_seckill_script_missing_stock_is_empty() {
    let store = redis_store();
    let (stock, ordered) = run_keys();

    assert_eq!(
        store.seckill_reserve(&stock, &ordered, "1").await.unwrap(),
        AdmissionCode::StockEmpty
    );
    assert!(!store.set_is_member(&ordered, "1").await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_seckill_script_never_oversells_under_concurrency() {
    let store = redis_store();
    let (stock, ordered) = run_keys();
    store.set(&stock, "10", Some(Duration::from_secs(60))).await.unwrap();

    let attempts = (0..100).map(|user| {
        let store = store.clone();
        let (stock, ordered) = (stock.clone(), ordered.clone());
        tokio::spawn(async move { store.seckill_reserve(&stock, &ordered, &user.to_string()).await })
    });
    let mut admitted = 0;
    for attempt in attempts {
        if attempt.await.unwrap().unwrap() == AdmissionCode::Ok {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 10);
    assert_eq!(store.get(&stock).await.unwrap().as_deref(), Some("0"));

    store.delete(&stock).await.unwrap();
    store.delete(&ordered).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_release_script_restores_only_admitted_users() {
    let store = redis_store();
    let (stock, ordered) = run_keys();
    store.set(&stock, "2", Some(Duration::from_secs(60))).await.unwrap();
    store.seckill_reserve(&stock, &ordered, "3").await.unwrap();

    assert!(store.seckill_release(&stock, &ordered, "3").await.unwrap());
    assert_eq!(store.get(&stock).await.unwrap().as_deref(), Some("2"));
    assert!(!store.set_is_member(&ordered, "3").await.unwrap());

    // Second release is a no-op
    assert!(!store.seckill_release(&stock, &ordered, "3").await.unwrap());
    assert_eq!(store.get(&stock).await.unwrap().as_deref(), Some("2"));

    store.delete(&stock).await.unwrap();
    store.delete(&ordered).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_unlock_script_deletes_only_for_owner() {
    let store = redis_store();
    let key = format!("lock:test:{}", Uuid::new_v4());

    assert!(store.set_nx(&key, "owner-a", Duration::from_secs(30)).await.unwrap());
    assert!(!store.set_nx(&key, "owner-b", Duration::from_secs(30)).await.unwrap());

    assert!(!store.compare_and_delete(&key, "owner-b").await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("owner-a"));

    assert!(store.compare_and_delete(&key, "owner-a").await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());
}
