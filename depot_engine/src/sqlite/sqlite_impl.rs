//! `SqliteDatabase` is a concrete implementation of a Depot order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Every multi-step operation runs inside a single transaction;
//! SQLite's single-writer model plus compare-and-set state transitions stand in for row-level
//! `SELECT ... FOR UPDATE SKIP LOCKED` on engines that have it: a transition whose conditional
//! update matches zero rows is a miss, and a miss is a no-op, never a double-process.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Duration, Utc};
use depot_common::{Coins, Currency};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{balances, catalog, db_url, inventory, locks, new_pool, orders, purchases, settings, stock};
use crate::{
    db_types::{CatalogItem, NewCatalogItem, NewOrder, Order, OrderId, OrderState, StockLedgerEntry},
    helpers::EconomyTuning,
    order_objects::{
        CancelledOrder,
        CompletedOrder,
        CreateOrderRequest,
        CreatedOrder,
        ExpeditedOrder,
        OrderQueryFilter,
        OrderSummary,
    },
    sqlite::db::stock::ReserveOutcome,
    traits::{
        BalanceManagement,
        CatalogManagement,
        InventoryManagement,
        OrderGatewayDatabase,
        OrderGatewayError,
        OrderManagement,
        SettingsManagement,
    },
};

const DEPOSIT_REASON: &str = "order deposit";
const EXPEDITE_REASON: &str = "order expedite";
const BALANCE_DUE_REASON: &str = "order balance due";
const CANCEL_REFUND_REASON: &str = "order cancellation refund";
const FORFEIT_REFUND_REASON: &str = "pickup window forfeiture refund";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the `DEPOT_DATABASE_URL` environment
    /// variable, or the default URL if it is not set.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Validates the request against the catalog, the player's profile and the velocity /
    /// concurrency caps, and prices the order. Called inside the creation transaction so the
    /// checks and the mutations see the same snapshot.
    async fn validate_and_price(
        &self,
        req: &CreateOrderRequest,
        now: DateTime<Utc>,
        conn: &mut SqliteConnection,
    ) -> Result<(CatalogItem, EconomyTuning, NewOrder), OrderGatewayError> {
        if req.quantity <= 0 {
            return Err(OrderGatewayError::InvalidAmount(format!("quantity must be positive, not {}", req.quantity)));
        }
        if req.expedite_spend.is_negative() {
            return Err(OrderGatewayError::InvalidAmount("expedite spend may not be negative".to_string()));
        }
        let item =
            catalog::fetch_item(req.item_id, &mut *conn).await?.ok_or(OrderGatewayError::ItemNotFound(req.item_id))?;
        if !item.is_available_at(now) {
            return Err(OrderGatewayError::ItemNotAvailable(item.id));
        }
        if req.user_tier < item.min_tier || req.user_level < item.min_level {
            return Err(OrderGatewayError::Ineligible(format!(
                "item {} requires tier {} and level {}",
                item.id, item.min_tier, item.min_level
            )));
        }
        if let Some(daily) = item.daily_limit {
            let bought = purchases::quantity_since(req.user_id, item.id, now - Duration::hours(24), &mut *conn).await?;
            if bought + req.quantity > daily {
                return Err(OrderGatewayError::PurchaseLimit(format!("daily cap of {daily} for item {}", item.id)));
            }
        }
        if let Some(weekly) = item.weekly_limit {
            let bought = purchases::quantity_since(req.user_id, item.id, now - Duration::days(7), &mut *conn).await?;
            if bought + req.quantity > weekly {
                return Err(OrderGatewayError::PurchaseLimit(format!("weekly cap of {weekly} for item {}", item.id)));
            }
        }
        if let Some(lifetime) = item.lifetime_limit {
            let bought = purchases::lifetime_quantity(req.user_id, item.id, &mut *conn).await?;
            if bought + req.quantity > lifetime {
                return Err(OrderGatewayError::PurchaseLimit(format!(
                    "lifetime cap of {lifetime} for item {}",
                    item.id
                )));
            }
        }
        let tuning = settings::load_tuning(&mut *conn).await?;
        let open = orders::count_open_orders(req.user_id, &mut *conn).await?;
        if open >= tuning.max_open_orders {
            return Err(OrderGatewayError::PurchaseLimit(format!("no more than {} open orders", tuning.max_open_orders)));
        }
        let open_item = orders::count_open_orders_for_item(req.user_id, item.id, &mut *conn).await?;
        if open_item >= tuning.max_open_per_item {
            return Err(OrderGatewayError::PurchaseLimit(format!(
                "no more than {} open orders for one item",
                tuning.max_open_per_item
            )));
        }
        let rarity = item.rarity_tier();
        let deposit_pct = tuning.deposit_pct(rarity);
        let wait = tuning.wait_minutes(rarity, req.expedite_spend);
        let overflow =
            || OrderGatewayError::InvalidAmount(format!("quantity {} overflows the order price", req.quantity));
        let gross_credits = item.price_credits.checked_mul(req.quantity).ok_or_else(overflow)?;
        let gross_essence = item.price_essence.checked_mul(req.quantity).ok_or_else(overflow)?;
        let order = NewOrder {
            order_ref: OrderId::random(),
            user_id: req.user_id,
            item_id: item.id,
            quantity: req.quantity,
            deposit_pct,
            deposit_credits: gross_credits.percent(deposit_pct),
            deposit_essence: gross_essence.percent(deposit_pct),
            expedite_spend: req.expedite_spend,
            price_credits: item.price_credits,
            price_essence: item.price_essence,
            eta_at: now + Duration::minutes(wait),
            idempotency_key: req.idempotency_key.clone(),
        };
        Ok((item, tuning, order))
    }

    /// One back-ordered order's shot at a reservation, in its own transaction.
    async fn promote_one(&self, stale: &Order) -> Result<Option<Order>, OrderGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::fetch_order_by_ref(&stale.order_ref, &mut tx).await? {
            Some(o) if o.state == OrderState::Placed => o,
            _ => return Ok(None),
        };
        let item = catalog::fetch_item(order.item_id, &mut tx)
            .await?
            .ok_or(OrderGatewayError::ItemNotFound(order.item_id))?;
        let outcome =
            stock::try_reserve(item.id, order.quantity, &order.order_ref, item.limited_stock, &mut tx).await?;
        if outcome == ReserveOutcome::Insufficient {
            return Ok(None);
        }
        let promoted = orders::transition_state(order.id, OrderState::Placed, OrderState::Scheduled, &mut tx).await?;
        tx.commit().await?;
        Ok(promoted)
    }

    /// Moves one due order to `ReadyForPickup`, in its own transaction. A state miss (the user
    /// completed or cancelled concurrently) is success-no-op.
    async fn release_one(&self, stale: &Order, now: DateTime<Utc>) -> Result<Option<Order>, OrderGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::fetch_order_by_ref(&stale.order_ref, &mut tx).await? {
            Some(o) if o.state == OrderState::Scheduled && o.eta_at <= now => o,
            _ => return Ok(None),
        };
        let item = catalog::fetch_item(order.item_id, &mut tx)
            .await?
            .ok_or(OrderGatewayError::ItemNotFound(order.item_id))?;
        // Scheduled implies reserved, but the check is cheap to repeat and must be idempotent.
        let outcome =
            stock::try_reserve(item.id, order.quantity, &order.order_ref, item.limited_stock, &mut tx).await?;
        if outcome == ReserveOutcome::Insufficient {
            warn!("🕰️ Order {} is Scheduled but has no reservation and no stock; leaving for the next cycle", order.order_ref);
            return Ok(None);
        }
        let tuning = settings::load_tuning(&mut tx).await?;
        let deadline = now + Duration::hours(tuning.pickup_window_hours);
        let released = orders::mark_ready(order.id, deadline, &mut tx).await?;
        tx.commit().await?;
        Ok(released)
    }

    /// Forfeits one lapsed order, in its own transaction: partial deposit refund, reservation
    /// release, terminal state.
    async fn forfeit_one(&self, stale: &Order, now: DateTime<Utc>) -> Result<Option<Order>, OrderGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::fetch_order_by_ref(&stale.order_ref, &mut tx).await? {
            Some(o) if o.state == OrderState::ReadyForPickup && o.pickup_expires_at.map(|t| t < now).unwrap_or(false) => {
                o
            },
            _ => return Ok(None),
        };
        let tuning = settings::load_tuning(&mut tx).await?;
        let keep = (100 - tuning.forfeit_fee_pct).clamp(0, 100);
        let refund_credits = order.deposit_credits.percent(keep);
        let refund_essence = order.deposit_essence.percent(keep);
        balances::credit(order.user_id, Currency::Credits, refund_credits, FORFEIT_REFUND_REASON, Some(&order.order_ref), &mut tx)
            .await?;
        balances::credit(order.user_id, Currency::Essence, refund_essence, FORFEIT_REFUND_REASON, Some(&order.order_ref), &mut tx)
            .await?;
        stock::release_reservation(order.item_id, order.quantity, &order.order_ref, &mut tx).await?;
        let forfeited =
            orders::transition_state(order.id, OrderState::ReadyForPickup, OrderState::CancelledForfeit, &mut tx)
                .await?;
        tx.commit().await?;
        Ok(forfeited)
    }
}

impl OrderGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, req: CreateOrderRequest) -> Result<CreatedOrder, OrderGatewayError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        // Idempotency short-circuit: a matching (user, key) order is returned unchanged, with
        // no re-validation and no side effects.
        if let Some(key) = req.idempotency_key.as_deref() {
            if let Some(existing) = orders::fetch_order_by_idempotency_key(req.user_id, key, &mut tx).await? {
                debug!("📦️ Idempotent replay of order {} for user {}", existing.order_ref, req.user_id);
                let expedited = !existing.expedite_spend.is_zero();
                return Ok(CreatedOrder { order: existing, freshly_created: false, expedited });
            }
        }
        let (item, _tuning, new_order) = self.validate_and_price(&req, now, &mut tx).await?;
        // Verify before mutating so a shortfall surfaces with no side effects at all.
        let essence_needed = new_order.deposit_essence + new_order.expedite_spend;
        if !balances::has_enough(req.user_id, Currency::Credits, new_order.deposit_credits, &mut tx).await? {
            return Err(OrderGatewayError::InsufficientFunds(Currency::Credits));
        }
        if !balances::has_enough(req.user_id, Currency::Essence, essence_needed, &mut tx).await? {
            return Err(OrderGatewayError::InsufficientFunds(Currency::Essence));
        }
        balances::debit(req.user_id, Currency::Credits, new_order.deposit_credits, DEPOSIT_REASON, Some(&new_order.order_ref), &mut tx)
            .await?;
        balances::debit(req.user_id, Currency::Essence, new_order.deposit_essence, DEPOSIT_REASON, Some(&new_order.order_ref), &mut tx)
            .await?;
        balances::debit(req.user_id, Currency::Essence, new_order.expedite_spend, EXPEDITE_REASON, Some(&new_order.order_ref), &mut tx)
            .await?;
        let expedited = !new_order.expedite_spend.is_zero();
        let mut order = match orders::insert_order(new_order, &mut tx).await {
            Ok(order) => order,
            Err(OrderGatewayError::OrderAlreadyExists(user_id, key)) if req.idempotency_key.is_some() => {
                // A concurrent twin with the same key won the race to insert. Our debits roll
                // back and the winner's order is replayed instead.
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let existing = orders::fetch_order_by_idempotency_key(user_id, &key, &mut conn)
                    .await?
                    .ok_or(OrderGatewayError::OrderAlreadyExists(user_id, key))?;
                debug!("📦️ Idempotent replay of order {} for user {}", existing.order_ref, user_id);
                let expedited = !existing.expedite_spend.is_zero();
                return Ok(CreatedOrder { order: existing, freshly_created: false, expedited });
            },
            Err(e) => return Err(e),
        };
        debug!("📦️ Order {} inserted with id {} for user {}", order.order_ref, order.id, order.user_id);
        match stock::try_reserve(item.id, order.quantity, &order.order_ref, item.limited_stock, &mut tx).await? {
            ReserveOutcome::Reserved | ReserveOutcome::AlreadyReserved => {
                order = orders::transition_state(order.id, OrderState::Placed, OrderState::Scheduled, &mut tx)
                    .await?
                    .ok_or_else(|| OrderGatewayError::InvalidState(order.order_ref.clone(), order.state))?;
            },
            ReserveOutcome::Insufficient if item.backorder => {
                info!("📦️ Order {} is back-ordered: item {} has no stock", order.order_ref, item.id);
            },
            ReserveOutcome::Insufficient => {
                // The whole transaction (deposit debit included) rolls back here.
                return Err(OrderGatewayError::OutOfStock(item.id));
            },
        }
        tx.commit().await?;
        Ok(CreatedOrder { order, freshly_created: true, expedited })
    }

    async fn complete_order(
        &self,
        order_ref: &OrderId,
        idempotency_key: Option<&str>,
    ) -> Result<CompletedOrder, OrderGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_ref(order_ref, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::OrderNotFound(order_ref.clone()))?;
        if let Some(key) = idempotency_key {
            if let Some(record) = purchases::fetch_by_idempotency_key(order.user_id, key, &mut tx).await? {
                debug!("📦️ Idempotent replay of completion for order {}", record.order_ref);
                let completed = orders::fetch_order_by_ref(&record.order_ref, &mut tx)
                    .await?
                    .ok_or_else(|| OrderGatewayError::OrderNotFound(record.order_ref.clone()))?;
                return Ok(CompletedOrder {
                    order: completed,
                    items_minted: record.quantity,
                    paid_credits: record.paid_credits,
                    paid_essence: record.paid_essence,
                    freshly_completed: false,
                });
            }
        }
        if order.state != OrderState::ReadyForPickup {
            return Err(OrderGatewayError::InvalidState(order.order_ref.clone(), order.state));
        }
        let due_credits = order.remaining_credits();
        let due_essence = order.remaining_essence();
        if !balances::has_enough(order.user_id, Currency::Credits, due_credits, &mut tx).await? {
            return Err(OrderGatewayError::InsufficientFunds(Currency::Credits));
        }
        if !balances::has_enough(order.user_id, Currency::Essence, due_essence, &mut tx).await? {
            return Err(OrderGatewayError::InsufficientFunds(Currency::Essence));
        }
        balances::debit(order.user_id, Currency::Credits, due_credits, BALANCE_DUE_REASON, Some(&order.order_ref), &mut tx).await?;
        balances::debit(order.user_id, Currency::Essence, due_essence, BALANCE_DUE_REASON, Some(&order.order_ref), &mut tx).await?;
        inventory::mint(order.user_id, order.item_id, &order.order_ref, order.quantity, &mut tx).await?;
        purchases::insert_purchase(
            order.user_id,
            order.item_id,
            order.quantity,
            &order.order_ref,
            due_credits,
            due_essence,
            idempotency_key,
            &mut tx,
        )
        .await?;
        stock::convert_reservation_to_sale(order.item_id, order.quantity, &order.order_ref, &mut tx).await?;
        let completed = orders::transition_state(order.id, OrderState::ReadyForPickup, OrderState::Completed, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::InvalidState(order.order_ref.clone(), order.state))?;
        tx.commit().await?;
        info!("📦️ Order {} completed: {} × item {} delivered to user {}", completed.order_ref, completed.quantity, completed.item_id, completed.user_id);
        Ok(CompletedOrder {
            order: completed,
            items_minted: order.quantity,
            paid_credits: due_credits,
            paid_essence: due_essence,
            freshly_completed: true,
        })
    }

    async fn expedite_order(&self, order_ref: &OrderId, essence: Coins) -> Result<ExpeditedOrder, OrderGatewayError> {
        if essence.is_negative() || essence.is_zero() {
            return Err(OrderGatewayError::InvalidAmount(format!("expedite spend must be positive, not {essence}")));
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_ref(order_ref, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::OrderNotFound(order_ref.clone()))?;
        if !order.state.is_open() {
            return Err(OrderGatewayError::InvalidState(order.order_ref.clone(), order.state));
        }
        if !balances::has_enough(order.user_id, Currency::Essence, essence, &mut tx).await? {
            return Err(OrderGatewayError::InsufficientFunds(Currency::Essence));
        }
        balances::debit(order.user_id, Currency::Essence, essence, EXPEDITE_REASON, Some(&order.order_ref), &mut tx).await?;
        let item = catalog::fetch_item(order.item_id, &mut tx)
            .await?
            .ok_or(OrderGatewayError::ItemNotFound(order.item_id))?;
        let tuning = settings::load_tuning(&mut tx).await?;
        let total_spend = order.expedite_spend + essence;
        // Anchored at creation, so the new ETA is a pure function of the accumulated spend.
        let wait = tuning.wait_minutes(item.rarity_tier(), total_spend);
        let new_eta = order.created_at + Duration::minutes(wait);
        let updated = orders::apply_expedite(order.id, total_spend, new_eta, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::InvalidState(order.order_ref.clone(), order.state))?;
        tx.commit().await?;
        info!("⏩️ Order {} expedited: total spend {total_spend}, ETA now {new_eta}", updated.order_ref);
        Ok(ExpeditedOrder { new_eta: updated.eta_at, total_expedite_spend: updated.expedite_spend, order: updated })
    }

    async fn cancel_order(&self, order_ref: &OrderId) -> Result<CancelledOrder, OrderGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_ref(order_ref, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::OrderNotFound(order_ref.clone()))?;
        if !order.state.is_open() {
            return Err(OrderGatewayError::InvalidState(order.order_ref.clone(), order.state));
        }
        let tuning = settings::load_tuning(&mut tx).await?;
        // The cancellation fee only applies once stock was actually reserved.
        let fee_pct = if order.state == OrderState::Scheduled { tuning.cancel_fee_pct.clamp(0, 100) } else { 0 };
        let keep = 100 - fee_pct;
        let refund_credits = order.deposit_credits.percent(keep);
        let refund_essence = order.deposit_essence.percent(keep);
        balances::credit(order.user_id, Currency::Credits, refund_credits, CANCEL_REFUND_REASON, Some(&order.order_ref), &mut tx).await?;
        balances::credit(order.user_id, Currency::Essence, refund_essence, CANCEL_REFUND_REASON, Some(&order.order_ref), &mut tx).await?;
        stock::release_reservation(order.item_id, order.quantity, &order.order_ref, &mut tx).await?;
        let cancelled = orders::transition_state(order.id, order.state, OrderState::CancelledRefund, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::InvalidState(order.order_ref.clone(), order.state))?;
        tx.commit().await?;
        info!("❌️ Order {} cancelled; refunded {refund_credits} credits / {refund_essence} essence", cancelled.order_ref);
        Ok(CancelledOrder { order: cancelled, refund_credits, refund_essence })
    }

    async fn promote_backorders(&self, _now: DateTime<Utc>) -> Result<Vec<Order>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let candidates = orders::placed_backorders(&mut conn).await?;
        drop(conn);
        let mut promoted = Vec::new();
        for order in &candidates {
            match self.promote_one(order).await {
                Ok(Some(o)) => promoted.push(o),
                Ok(None) => {},
                Err(e) => error!("🕰️ Error promoting back-order {}: {e}", order.order_ref),
            }
        }
        Ok(promoted)
    }

    async fn release_due_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let candidates = orders::due_scheduled(now, &mut conn).await?;
        drop(conn);
        let mut released = Vec::new();
        for order in &candidates {
            match self.release_one(order, now).await {
                Ok(Some(o)) => released.push(o),
                Ok(None) => {},
                Err(e) => error!("🕰️ Error releasing order {}: {e}", order.order_ref),
            }
        }
        Ok(released)
    }

    async fn forfeit_lapsed_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let candidates = orders::lapsed_ready(now, &mut conn).await?;
        drop(conn);
        let mut forfeited = Vec::new();
        for order in &candidates {
            match self.forfeit_one(order, now).await {
                Ok(Some(o)) => forfeited.push(o),
                Ok(None) => {},
                Err(e) => error!("🕰️ Error forfeiting order {}: {e}", order.order_ref),
            }
        }
        Ok(forfeited)
    }

    async fn try_acquire_named_lock(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        locks::try_acquire(name, holder, ttl, Utc::now(), &mut conn).await
    }

    async fn release_named_lock(&self, name: &str, holder: &str) -> Result<(), OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        locks::release(name, holder, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_ref: &OrderId) -> Result<Option<Order>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_ref(order_ref, &mut conn).await?;
        Ok(order)
    }

    async fn orders_for_user(
        &self,
        user_id: i64,
        filter: OrderQueryFilter,
    ) -> Result<Vec<OrderSummary>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let found = orders::search_orders(user_id, &filter, &mut conn).await?;
        let now = Utc::now();
        let mut items: HashMap<i64, (String, String)> = HashMap::new();
        let mut summaries = Vec::with_capacity(found.len());
        for order in found {
            if !items.contains_key(&order.item_id) {
                let item = catalog::fetch_item(order.item_id, &mut conn)
                    .await?
                    .ok_or(OrderGatewayError::ItemNotFound(order.item_id))?;
                items.insert(order.item_id, (item.name, item.item_type));
            }
            let (name, item_type) = items.get(&order.item_id).cloned().unwrap_or_default();
            summaries.push(OrderSummary::annotate(order, name, item_type, now));
        }
        Ok(summaries)
    }

    async fn available_stock(&self, item_id: i64) -> Result<i64, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        stock::available_stock(item_id, &mut conn).await?.ok_or(OrderGatewayError::ItemNotFound(item_id))
    }
}

impl BalanceManagement for SqliteDatabase {
    async fn fetch_or_create_balance(
        &self,
        user_id: i64,
        currency: Currency,
    ) -> Result<crate::db_types::Balance, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        balances::fetch_or_create(user_id, currency, &mut conn).await
    }

    async fn has_enough(&self, user_id: i64, currency: Currency, amount: Coins) -> Result<bool, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        balances::has_enough(user_id, currency, amount, &mut conn).await
    }

    async fn credit(
        &self,
        user_id: i64,
        currency: Currency,
        amount: Coins,
        reason: &str,
        order_ref: Option<&OrderId>,
    ) -> Result<crate::db_types::Balance, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        balances::credit(user_id, currency, amount, reason, order_ref, &mut conn).await
    }

    async fn debit(
        &self,
        user_id: i64,
        currency: Currency,
        amount: Coins,
        reason: &str,
        order_ref: Option<&OrderId>,
    ) -> Result<crate::db_types::Balance, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        balances::debit(user_id, currency, amount, reason, order_ref, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_item(&self, item_id: i64) -> Result<Option<CatalogItem>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let item = catalog::fetch_item(item_id, &mut conn).await?;
        Ok(item)
    }

    async fn insert_item(&self, item: NewCatalogItem) -> Result<CatalogItem, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_item(item, &mut conn).await
    }

    async fn restock_item(&self, item_id: i64, quantity: i64) -> Result<StockLedgerEntry, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_item(item_id, &mut conn).await?.ok_or(OrderGatewayError::ItemNotFound(item_id))?;
        stock::restock(item_id, quantity, &mut conn).await
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn get_int(&self, key: &str) -> Result<Option<i64>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        settings::get_int(key, &mut conn).await
    }

    async fn get_float(&self, key: &str) -> Result<Option<f64>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        settings::get_float(key, &mut conn).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        settings::set_value(key, value, &mut conn).await
    }

    async fn economy_tuning(&self) -> Result<EconomyTuning, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        settings::load_tuning(&mut conn).await
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn inventory_count(&self, user_id: i64, item_id: i64) -> Result<i64, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let count = inventory::count(user_id, item_id, &mut conn).await?;
        Ok(count)
    }
}
