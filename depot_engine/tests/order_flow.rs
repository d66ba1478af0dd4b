//! End-to-end order flow tests against a real (throwaway) SQLite database: deposit pricing,
//! idempotent creation, completion accounting, expedites, cancellation fees, and the hard
//! failure modes.
use chrono::{Duration, Utc};
use depot_common::{Coins, Currency};
use depot_engine::{
    db_types::{NewCatalogItem, NewOrder, OrderId, OrderState, Rarity},
    sqlite::db::orders,
    order_objects::{CreateOrderRequest, OrderQueryFilter},
    BalanceManagement,
    InventoryManagement,
    OrderFlowApi,
    OrderGatewayDatabase,
    OrderGatewayError,
    SqliteDatabase,
};
use tokio::runtime::Runtime;

mod support;
use support::prepare_env::{prepare_test_env, random_db_path, seed_balance, seed_item};

const ALICE: i64 = 101;

fn run<F: std::future::Future<Output = ()>>(f: impl FnOnce(String) -> F) {
    let sys = Runtime::new().unwrap();
    sys.block_on(f(random_db_path()));
}

async fn balance_of(db: &SqliteDatabase, user_id: i64, currency: Currency) -> i64 {
    db.fetch_or_create_balance(user_id, currency).await.expect("Error fetching balance").balance.value()
}

#[test]
fn deposit_order_lifecycle() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        // Rare item, price 100 credits, 40% deposit. Two units: deposit 80, balance due 120.
        let item = seed_item(&db, NewCatalogItem::new("Stormcaller Gauntlet", Rarity::Rare, Coins::from(100)).with_stock(10)).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(500)).await;

        let created =
            api.place_order(CreateOrderRequest::new(ALICE, item.id, 2)).await.expect("Error placing order");
        assert!(created.freshly_created);
        assert!(!created.expedited);
        let order = created.order;
        assert_eq!(order.state, OrderState::Scheduled, "stock was available, so the order reserves immediately");
        assert_eq!(order.deposit_pct, 40);
        assert_eq!(order.deposit_credits.value(), 80);
        assert_eq!(order.remaining_credits().value(), 120);
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 420);
        assert_eq!(api.available_stock(item.id).await.unwrap(), 8);

        // Completion is only legal from ReadyForPickup.
        let err = api.complete_order(&order.order_ref, None).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::InvalidState(_, OrderState::Scheduled)));

        // Force the order ready (the reconciliation pass normally does this).
        let released = db.release_due_orders(Utc::now() + Duration::days(2)).await.expect("Error releasing orders");
        assert_eq!(released.len(), 1);

        let completed = api.complete_order(&order.order_ref, None).await.expect("Error completing order");
        assert!(completed.freshly_completed);
        assert_eq!(completed.items_minted, 2);
        assert_eq!(completed.paid_credits.value(), 120);
        assert_eq!(completed.order.state, OrderState::Completed);
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 300);
        assert_eq!(db.inventory_count(ALICE, item.id).await.unwrap(), 2);
        // The sale is permanent: completion does not return units to the pool.
        assert_eq!(api.available_stock(item.id).await.unwrap(), 8);
    });
}

#[test]
fn creation_is_idempotent() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let item = seed_item(&db, NewCatalogItem::new("Wayfarer Compass", Rarity::Common, Coins::from(50))).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(200)).await;

        let req = CreateOrderRequest::new(ALICE, item.id, 1).with_idempotency_key("req-abc-1");
        let first = api.place_order(req.clone()).await.expect("Error placing order");
        assert!(first.freshly_created);
        let replay = api.place_order(req).await.expect("Error replaying order");
        assert!(!replay.freshly_created);
        assert_eq!(replay.order.order_ref, first.order.order_ref);
        // Exactly one deposit was charged. Common tier deposits 30% of 50.
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 185);

        let orders = api.orders_for_user(ALICE, OrderQueryFilter::default()).await.expect("Error listing orders");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].item_name, "Wayfarer Compass");
    });
}

#[test]
fn insufficient_funds_leaves_no_trace() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let item = seed_item(&db, NewCatalogItem::new("Aegis Plate", Rarity::Legendary, Coins::from(1000)).with_stock(5)).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(100)).await;

        // Legendary deposit is 60% of 1000; Alice has 100.
        let err = api.place_order(CreateOrderRequest::new(ALICE, item.id, 1)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::InsufficientFunds(Currency::Credits)));
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 100);
        assert_eq!(api.available_stock(item.id).await.unwrap(), 5);
        assert!(api.orders_for_user(ALICE, OrderQueryFilter::default()).await.unwrap().is_empty());
    });
}

#[test]
fn expedite_shortens_eta_with_diminishing_returns() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let item = seed_item(&db, NewCatalogItem::new("Voidheart Sigil", Rarity::Epic, Coins::from(400)).with_stock(3)).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(1000)).await;
        seed_balance(&db, ALICE, Currency::Essence, Coins::from(100)).await;

        let order = api.place_order(CreateOrderRequest::new(ALICE, item.id, 1)).await.unwrap().order;
        let base_eta = order.eta_at;

        let first = api.expedite_order(&order.order_ref, Coins::from(10)).await.expect("Error expediting");
        assert_eq!(first.total_expedite_spend.value(), 10);
        assert!(first.new_eta < base_eta);
        let first_gain = base_eta - first.new_eta;

        let second = api.expedite_order(&order.order_ref, Coins::from(10)).await.expect("Error expediting");
        assert_eq!(second.total_expedite_spend.value(), 20);
        assert!(second.new_eta < first.new_eta);
        let second_gain = first.new_eta - second.new_eta;
        assert!(second_gain < first_gain, "each essence buys less than the last");

        assert_eq!(balance_of(&db, ALICE, Currency::Essence).await, 80);

        let err = api.expedite_order(&order.order_ref, Coins::from(0)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::InvalidAmount(_)));
    });
}

#[test]
fn cancellation_fee_applies_only_once_reserved() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        // One unit in stock and back-orders allowed: the second order stays Placed.
        let item = seed_item(&db, NewCatalogItem::new("Ember Lantern", Rarity::Rare, Coins::from(100)).with_stock(1)).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(500)).await;

        let scheduled = api.place_order(CreateOrderRequest::new(ALICE, item.id, 1)).await.unwrap().order;
        assert_eq!(scheduled.state, OrderState::Scheduled);
        let placed = api.place_order(CreateOrderRequest::new(ALICE, item.id, 1)).await.unwrap().order;
        assert_eq!(placed.state, OrderState::Placed);
        // Two deposits of 40 are gone.
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 420);

        // Cancelling the back-order refunds the full deposit.
        let refund = api.cancel_order(&placed.order_ref).await.expect("Error cancelling");
        assert_eq!(refund.order.state, OrderState::CancelledRefund);
        assert_eq!(refund.refund_credits.value(), 40);
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 460);

        // Cancelling the reserved order pays the 10% fee and returns the unit to the pool.
        let refund = api.cancel_order(&scheduled.order_ref).await.expect("Error cancelling");
        assert_eq!(refund.refund_credits.value(), 36);
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 496);
        assert_eq!(api.available_stock(item.id).await.unwrap(), 1);

        // Terminal orders cannot be cancelled again.
        let err = api.cancel_order(&scheduled.order_ref).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::InvalidState(_, OrderState::CancelledRefund)));
    });
}

#[test]
fn strict_stock_item_rejects_when_empty() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let item = seed_item(
            &db,
            NewCatalogItem::new("Founders Cache", Rarity::Legendary, Coins::from(200)).with_stock(1).strict_stock(),
        )
        .await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(1000)).await;
        seed_balance(&db, 202, Currency::Credits, Coins::from(1000)).await;

        api.place_order(CreateOrderRequest::new(ALICE, item.id, 1)).await.expect("Error placing order");
        let err = api.place_order(CreateOrderRequest::new(202, item.id, 1)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::OutOfStock(_)));
        // The failed order charged nothing.
        assert_eq!(balance_of(&db, 202, Currency::Credits).await, 1000);
    });
}

#[test]
fn eligibility_and_purchase_caps_are_enforced() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let gated = seed_item(
            &db,
            NewCatalogItem::new("Veteran Banner", Rarity::Common, Coins::from(10)).with_requirements(3, 20),
        )
        .await;
        let capped = seed_item(
            &db,
            NewCatalogItem::new("Daily Ration", Rarity::Common, Coins::from(10)).with_limits(Some(2), None, None),
        )
        .await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(1000)).await;

        let err = api.place_order(CreateOrderRequest::new(ALICE, gated.id, 1).with_profile(2, 50)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::Ineligible(_)));
        api.place_order(CreateOrderRequest::new(ALICE, gated.id, 1).with_profile(3, 20))
            .await
            .expect("Error placing order at exactly the requirement");

        // The daily cap counts completed purchases, so complete one order for 2 units first.
        let order = api.place_order(CreateOrderRequest::new(ALICE, capped.id, 2)).await.unwrap().order;
        db.release_due_orders(Utc::now() + Duration::days(1)).await.unwrap();
        api.complete_order(&order.order_ref, None).await.expect("Error completing order");
        let err = api.place_order(CreateOrderRequest::new(ALICE, capped.id, 1)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::PurchaseLimit(_)));
    });
}

#[test]
fn open_order_caps_are_enforced() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let a = seed_item(&db, NewCatalogItem::new("Trinket A", Rarity::Common, Coins::from(10))).await;
        let b = seed_item(&db, NewCatalogItem::new("Trinket B", Rarity::Common, Coins::from(10))).await;
        let c = seed_item(&db, NewCatalogItem::new("Trinket C", Rarity::Common, Coins::from(10))).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(1000)).await;

        // Per-item cap first: the default is 2 open orders per item.
        api.place_order(CreateOrderRequest::new(ALICE, a.id, 1)).await.unwrap();
        api.place_order(CreateOrderRequest::new(ALICE, a.id, 1)).await.unwrap();
        let err = api.place_order(CreateOrderRequest::new(ALICE, a.id, 1)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::PurchaseLimit(_)));

        // Then the overall cap of 5 open orders.
        api.place_order(CreateOrderRequest::new(ALICE, b.id, 1)).await.unwrap();
        api.place_order(CreateOrderRequest::new(ALICE, b.id, 1)).await.unwrap();
        api.place_order(CreateOrderRequest::new(ALICE, c.id, 1)).await.unwrap();
        let err = api.place_order(CreateOrderRequest::new(ALICE, c.id, 1)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::PurchaseLimit(_)));
    });
}

#[test]
fn completion_is_idempotent() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let item = seed_item(&db, NewCatalogItem::new("Emberforge Hammer", Rarity::Rare, Coins::from(100)).with_stock(10)).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(500)).await;

        let order = api.place_order(CreateOrderRequest::new(ALICE, item.id, 2)).await.unwrap().order;
        db.release_due_orders(Utc::now() + Duration::days(2)).await.expect("Error releasing orders");

        let first = api.complete_order(&order.order_ref, Some("pickup-1")).await.expect("Error completing order");
        assert!(first.freshly_completed);
        assert_eq!(first.items_minted, 2);
        assert_eq!(first.paid_credits.value(), 120);
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 300);

        // Replaying the key returns the original result without charging or minting again.
        let replay = api.complete_order(&order.order_ref, Some("pickup-1")).await.expect("Error replaying completion");
        assert!(!replay.freshly_completed);
        assert_eq!(replay.order.order_ref, order.order_ref);
        assert_eq!(replay.order.state, OrderState::Completed);
        assert_eq!(replay.items_minted, 2);
        assert_eq!(replay.paid_credits.value(), 120);
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 300);
        assert_eq!(db.inventory_count(ALICE, item.id).await.unwrap(), 2);
    });
}

#[test]
fn absurd_quantities_cannot_overflow_pricing() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let api = OrderFlowApi::new(db.clone());
        let item = seed_item(&db, NewCatalogItem::new("Gilded Anvil", Rarity::Common, Coins::from(100)).with_stock(10)).await;
        seed_balance(&db, ALICE, Currency::Credits, Coins::from(500)).await;

        let err = api.place_order(CreateOrderRequest::new(ALICE, item.id, i64::MAX)).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::InvalidAmount(_)));
        assert_eq!(balance_of(&db, ALICE, Currency::Credits).await, 500);
        assert!(api.orders_for_user(ALICE, OrderQueryFilter::default()).await.unwrap().is_empty());
    });
}

#[test]
fn duplicate_key_insert_surfaces_as_order_already_exists() {
    run(|url| async move {
        let db = prepare_test_env(&url).await;
        let item = seed_item(&db, NewCatalogItem::new("Runed Lockbox", Rarity::Common, Coins::from(50))).await;
        let new_order = || NewOrder {
            order_ref: OrderId::random(),
            user_id: ALICE,
            item_id: item.id,
            quantity: 1,
            deposit_pct: 30,
            deposit_credits: Coins::from(15),
            deposit_essence: Coins::ZERO,
            expedite_spend: Coins::ZERO,
            price_credits: Coins::from(50),
            price_essence: Coins::ZERO,
            eta_at: Utc::now() + Duration::minutes(15),
            idempotency_key: Some("req-dup-1".to_string()),
        };

        // Two rows with the same (user, key): the second insert maps the unique violation to
        // the dedicated error kind that create_order turns into an idempotent replay.
        let mut conn = db.pool().acquire().await.unwrap();
        orders::insert_order(new_order(), &mut conn).await.expect("Error inserting order");
        let err = orders::insert_order(new_order(), &mut conn).await.unwrap_err();
        assert!(matches!(err, OrderGatewayError::OrderAlreadyExists(ALICE, ref key) if key == "req-dup-1"));
    });
}
