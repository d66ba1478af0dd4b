//! Drives the reconciliation worker against a real database and checks that a due order is
//! carried through to `ReadyForPickup` without any caller involvement.
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use depot_common::{Coins, Currency};
use depot_engine::{
    db_types::{NewCatalogItem, OrderState, Rarity},
    order_objects::CreateOrderRequest,
    test_utils::{prepare_test_env, random_db_path, seed_balance, seed_item},
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};
use depot_server::{config::ServerConfig, reconciler::start_reconciler};
use tokio::runtime::Runtime;

#[test]
fn worker_releases_due_orders() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let api = OrderFlowApi::new(db.clone());

        let item = seed_item(&db, NewCatalogItem::new("Instant Token", Rarity::Common, Coins::from(10))).await;
        seed_balance(&db, 1, Currency::Credits, Coins::from(100)).await;
        let order = api.place_order(CreateOrderRequest::new(1, item.id, 1)).await.unwrap().order;
        assert_eq!(order.state, OrderState::Scheduled);
        // Backdate the ETA so the order is due on the worker's first cycle.
        sqlx::query("UPDATE orders SET eta_at = datetime('now', '-1 minute') WHERE id = $1")
            .bind(order.id)
            .execute(db.pool())
            .await
            .expect("Error backdating order");

        let config = ServerConfig {
            database_url: url.clone(),
            worker_interval: Duration::from_millis(200),
            worker_jitter: Duration::ZERO,
            lock_ttl: ChronoDuration::seconds(30),
            max_connections: 5,
            instance_id: "test-node".to_string(),
        };
        let worker = start_reconciler(db.clone(), &config);

        // The first tick fires immediately; give it a couple of cycles of slack.
        let mut state = order.state;
        for _ in 0..25 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            state = db.fetch_order(&order.order_ref).await.unwrap().unwrap().state;
            if state == OrderState::ReadyForPickup {
                break;
            }
        }
        worker.abort();
        assert_eq!(state, OrderState::ReadyForPickup);
    });
}
