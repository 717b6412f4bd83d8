mod common;

use chrono::{Duration, Utc};
use common::{open_voucher, spawn_app, test_config};
use futures::future::join_all;
use shopreview_ws::domains::voucher::{PublishSeckillVoucher, SeckillError};
use shopreview_ws::services::id_worker::decompose;
use shopreview_ws::store::KvStore;
use std::collections::HashSet;

#[tokio::test]
async fn test_admissions_never_exceed_stock_and_orders_match() {
    let app = spawn_app(test_config());
    let service = &app.state.seckill_service;
    service.publish_seckill_voucher(open_voucher(1, 10)).await.unwrap();

    let results = join_all((1..=100).map(|user| service.seckill_voucher(1, user))).await;
    let admitted: Vec<i64> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(SeckillError::StockEmpty)))
        .count();

    assert_eq!(admitted.len(), 10);
    assert_eq!(sold_out, 90);
    assert_eq!(admitted.iter().collect::<HashSet<_>>().len(), 10);

    app.background.shutdown().await;
    let orders = app.vouchers.orders();
    assert_eq!(orders.len(), 10);
    assert_eq!(app.vouchers.stock_of(1), Some(0));

    let pairs: HashSet<_> = orders.iter().map(|o| (o.user_id, o.voucher_id)).collect();
    assert_eq!(pairs.len(), orders.len());
}

#[tokio::test]
async fn test_one_unit_two_users() {
    let app = spawn_app(test_config());
    let service = &app.state.seckill_service;
    service.publish_seckill_voucher(open_voucher(2, 1)).await.unwrap();

    let first = service.seckill_voucher(2, 100).await;
    let second = service.seckill_voucher(2, 200).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(SeckillError::StockEmpty)));

    app.background.shutdown().await;
    let orders = app.vouchers.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].user_id, 100);
    assert_eq!(orders[0].id, first.unwrap());
}

#[tokio::test]
async fn test_same_user_is_limited_to_one_order() {
    let app = spawn_app(test_config());
    let service = &app.state.seckill_service;
    service.publish_seckill_voucher(open_voucher(3, 5)).await.unwrap();

    assert!(service.seckill_voucher(3, 7).await.is_ok());
    assert!(matches!(service.seckill_voucher(3, 7).await, Err(SeckillError::LimitExceeded)));

    let concurrent = join_all((0..20).map(|_| service.seckill_voucher(3, 8))).await;
    assert_eq!(concurrent.iter().filter(|r| r.is_ok()).count(), 1);

    app.background.shutdown().await;
    assert_eq!(app.vouchers.orders().len(), 2);
    assert_eq!(app.vouchers.stock_of(3), Some(3));
}

#[tokio::test]
async fn test_window_and_unknown_voucher_are_rejected() {
    let app = spawn_app(test_config());
    let service = &app.state.seckill_service;
    let now = Utc::now();

    service
        .publish_seckill_voucher(PublishSeckillVoucher {
            voucher_id: 4,
            stock: 5,
            begin_time: now + Duration::hours(1),
            end_time: now + Duration::hours(2),
        })
        .await
        .unwrap();
    service
        .publish_seckill_voucher(PublishSeckillVoucher {
            voucher_id: 5,
            stock: 5,
            begin_time: now - Duration::hours(2),
            end_time: now - Duration::hours(1),
        })
        .await
        .unwrap();

    assert!(matches!(service.seckill_voucher(4, 1).await, Err(SeckillError::NotStarted)));
    assert!(matches!(service.seckill_voucher(5, 1).await, Err(SeckillError::Ended)));
    assert!(matches!(service.seckill_voucher(6, 1).await, Err(SeckillError::VoucherNotFound(6))));

    // Rejected requests never touch the admission gate.
    assert_eq!(app.store.get("seckill:stock:4").await.unwrap().as_deref(), Some("5"));
    app.background.shutdown().await;
    assert!(app.vouchers.orders().is_empty());
}

#[tokio::test]
async fn test_full_queue_rejects_and_restores_stock() {
    let mut config = test_config();
    config.seckill.queue_capacity = 1;
    let app = spawn_app(config);
    let service = &app.state.seckill_service;
    service.publish_seckill_voucher(open_voucher(7, 50)).await.unwrap();

    // No await point between admissions lets the processor run, so the
    // second intent finds the single slot taken.
    let results = join_all((1..=2).map(|user| service.seckill_voucher(7, user))).await;
    let busy = results.iter().filter(|r| matches!(r, Err(SeckillError::Busy))).count();
    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok + busy, 2);

    let remaining: i64 = app
        .store
        .get("seckill:stock:7")
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(remaining, 50 - ok as i64);

    for (user, result) in (1..=2).zip(&results) {
        let reserved = app.store.set_is_member("seckill:order:7", &user.to_string()).await.unwrap();
        assert_eq!(reserved, result.is_ok());
    }
    app.background.shutdown().await;
}

#[tokio::test]
async fn test_order_ids_share_timestamp_bits_within_a_second() {
    let app = spawn_app(test_config());
    let now = Utc::now();

    let a = app.state.ids.next_id_at("order", now).await.unwrap();
    let b = app.state.ids.next_id_at("order", now).await.unwrap();

    assert!(b > a);
    assert_eq!(decompose(a).0, decompose(b).0);
    assert_eq!(decompose(b).1, decompose(a).1 + 1);
    app.background.shutdown().await;
}
