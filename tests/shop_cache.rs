mod common;

use common::{shop, spawn_app, test_config};
use futures::future::join_all;
use shopreview_ws::cache::LogicalEntry;
use shopreview_ws::domains::shop::{Shop, ShopUpdate};
use shopreview_ws::store::KvStore;

#[tokio::test]
async fn test_concurrent_cold_reads_return_the_same_shop() {
    let app = spawn_app(test_config());
    app.shops.insert(shop(5, "Dumpling Bar"));
    let service = &app.state.shop_service;

    let reads = join_all((0..50).map(|_| service.query_by_id(5))).await;
    for read in reads {
        assert_eq!(read.unwrap().name, "Dumpling Bar");
    }
    assert!(app.store.get("cache:shop:5").await.unwrap().is_some());

    app.background.shutdown().await;
}

#[tokio::test]
async fn test_hot_shop_is_served_from_logical_entry() {
    let app = spawn_app(test_config());
    app.shops.insert(shop(6, "Hot Pot"));
    let service = &app.state.shop_service;

    assert!(service.warm_hot_shop(6).await.unwrap());
    assert!(!service.warm_hot_shop(600).await.unwrap());

    let raw = app.store.get("cache:shop:hot:6").await.unwrap().unwrap();
    let entry: LogicalEntry<Shop> = serde_json::from_str(&raw).unwrap();
    assert_eq!(entry.data.name, "Hot Pot");

    assert_eq!(service.query_by_id(6).await.unwrap().name, "Hot Pot");
    // Served from the hot namespace, the mutex namespace stays cold.
    assert!(app.store.get("cache:shop:6").await.unwrap().is_none());

    app.background.shutdown().await;
}

#[tokio::test]
async fn test_update_then_read_sees_new_row() {
    let app = spawn_app(test_config());
    let original = shop(7, "Before");
    app.shops.insert(original.clone());
    let service = &app.state.shop_service;

    assert_eq!(service.query_by_id(7).await.unwrap().name, "Before");

    service
        .update(ShopUpdate {
            id: Some(7),
            name: "After".to_string(),
            type_id: original.type_id,
            images: original.images.clone(),
            area: original.area.clone(),
            address: original.address.clone(),
            x: original.x,
            y: original.y,
            avg_price: Some(75),
            open_hours: original.open_hours.clone(),
        })
        .await
        .unwrap();

    let updated = service.query_by_id(7).await.unwrap();
    assert_eq!(updated.name, "After");
    assert_eq!(updated.avg_price, Some(75));

    app.background.shutdown().await;
}
