//! A burst of concurrent orders fighting over scarce stock. With K units and N > K buyers,
//! exactly K orders may reserve; the rest either back-order or fail, and the ledger never
//! oversells.
use depot_common::{Coins, Currency};
use depot_engine::{
    db_types::{NewCatalogItem, OrderState, Rarity},
    order_objects::CreateOrderRequest,
    OrderFlowApi,
    OrderGatewayError,
    SqliteDatabase,
};
use futures_util::future::join_all;
use log::*;
use tokio::runtime::Runtime;

mod support;
use support::prepare_env::{prepare_test_env, random_db_path, seed_balance, seed_item};

const NUM_BUYERS: i64 = 12;
const STOCK: i64 = 5;

async fn seeded_db(url: &str, item: NewCatalogItem) -> (SqliteDatabase, i64) {
    let db = prepare_test_env(url).await;
    let item = seed_item(&db, item).await;
    for user_id in 1..=NUM_BUYERS {
        seed_balance(&db, user_id, Currency::Credits, Coins::from(1_000)).await;
    }
    // A single connection serialises the write transactions at the pool, so the burst exercises
    // the reservation logic rather than SQLite's write-lock contention.
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating database");
    (db, item.id)
}

#[test]
fn burst_orders_never_oversell_backorder_item() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let url = random_db_path();
        let item = NewCatalogItem::new("Meteor Fragment", Rarity::Rare, Coins::from(100)).with_stock(STOCK);
        let (db, item_id) = seeded_db(&url, item).await;
        let api = OrderFlowApi::new(db.clone());

        info!("🚀️ Injecting {NUM_BUYERS} concurrent orders against {STOCK} units");
        let tasks = (1..=NUM_BUYERS).map(|user_id| {
            let api = OrderFlowApi::new(db.clone());
            tokio::spawn(async move { api.place_order(CreateOrderRequest::new(user_id, item_id, 1)).await })
        });
        let results = join_all(tasks).await;

        let mut scheduled = 0;
        let mut backordered = 0;
        for result in results {
            let created = result.expect("task panicked").expect("Error placing order");
            match created.order.state {
                OrderState::Scheduled => scheduled += 1,
                OrderState::Placed => backordered += 1,
                other => panic!("unexpected state {other}"),
            }
        }
        assert_eq!(scheduled, STOCK, "exactly one order per unit may reserve");
        assert_eq!(backordered, NUM_BUYERS - STOCK);
        assert_eq!(api.available_stock(item_id).await.unwrap(), 0);
    });
}

#[test]
fn burst_orders_never_oversell_strict_item() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let url = random_db_path();
        let item =
            NewCatalogItem::new("Limited Medallion", Rarity::Rare, Coins::from(100)).with_stock(STOCK).strict_stock();
        let (db, item_id) = seeded_db(&url, item).await;
        let api = OrderFlowApi::new(db.clone());

        let tasks = (1..=NUM_BUYERS).map(|user_id| {
            let api = OrderFlowApi::new(db.clone());
            tokio::spawn(async move { api.place_order(CreateOrderRequest::new(user_id, item_id, 1)).await })
        });
        let results = join_all(tasks).await;

        let mut winners = Vec::new();
        let mut losers = 0;
        for result in results {
            match result.expect("task panicked") {
                Ok(created) => {
                    assert_eq!(created.order.state, OrderState::Scheduled);
                    winners.push(created.order);
                },
                Err(OrderGatewayError::OutOfStock(id)) => {
                    assert_eq!(id, item_id);
                    losers += 1;
                },
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners.len() as i64, STOCK);
        assert_eq!(losers, NUM_BUYERS - STOCK);
        assert_eq!(api.available_stock(item_id).await.unwrap(), 0);
        // Losers were not charged.
        let mut charged = 0;
        for user_id in 1..=NUM_BUYERS {
            use depot_engine::BalanceManagement;
            let balance = db.fetch_or_create_balance(user_id, Currency::Credits).await.unwrap().balance.value();
            if balance < 1_000 {
                charged += 1;
            }
        }
        assert_eq!(charged, STOCK);
    });
}
