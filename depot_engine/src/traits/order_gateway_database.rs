use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use depot_common::{Coins, Currency};
use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, OrderState},
    order_objects::{CancelledOrder, CompletedOrder, CreateOrderRequest, CreatedOrder, ExpeditedOrder},
    traits::OrderManagement,
};

/// Errors surfaced by the order gateway. Each variant is a stable error kind plus a
/// human-readable message; internal query detail is folded into `DatabaseError` and never
/// exposed to callers verbatim.
#[derive(Debug, Clone, Error)]
pub enum OrderGatewayError {
    #[error("We have an internal database engine error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested catalog item {0} does not exist")]
    ItemNotFound(i64),
    #[error("Catalog item {0} is not available for purchase right now")]
    ItemNotAvailable(i64),
    #[error("The player does not meet the item's requirements: {0}")]
    Ineligible(String),
    #[error("Insufficient {0} balance to cover the required amount")]
    InsufficientFunds(Currency),
    #[error("Purchase limit exceeded: {0}")]
    PurchaseLimit(String),
    #[error("Not enough stock of item {0} to fulfil the request")]
    OutOfStock(i64),
    #[error("Stock has already been reserved for order {0}")]
    AlreadyReserved(OrderId),
    #[error("An order for user {0} with idempotency key '{1}' already exists")]
    OrderAlreadyExists(i64, String),
    #[error("Order {0} is in state {1}, which does not permit this operation")]
    InvalidState(OrderId, OrderState),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
}

impl From<sqlx::Error> for OrderGatewayError {
    fn from(e: sqlx::Error) -> Self {
        OrderGatewayError::DatabaseError(e.to_string())
    }
}

/// The highest level of behaviour for backends supporting the Depot order engine.
///
/// Every method that mutates state does so inside a single atomic transaction: either all of
/// its side effects (balance movements, ledger rows, order state) persist, or none do. The
/// reconciliation passes additionally process each order in its own transaction, re-verifying
/// the expected state before mutating, so a concurrent user operation on one order can never be
/// double-applied or block the rest of a batch.
pub trait OrderGatewayDatabase: Clone + OrderManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Validates and creates a purchase order.
    ///
    /// If the request carries an idempotency key that matches an existing order for the same
    /// user, that order is returned unchanged with `freshly_created == false`; no validation is
    /// repeated and no side effects are applied.
    ///
    /// Otherwise, in one transaction: the deposit is debited per currency, the order row is
    /// written in `Placed` state, and — if available stock covers the quantity — a `Reserve`
    /// ledger entry is appended and the order advances to `Scheduled`. Items that do not permit
    /// back-orders fail with `OutOfStock` instead of remaining `Placed`.
    fn create_order(
        &self,
        req: CreateOrderRequest,
    ) -> impl Future<Output = Result<CreatedOrder, OrderGatewayError>> + Send;

    /// Completes a `ReadyForPickup` order: debits the balance due, mints the inventory grants,
    /// writes the purchase record, converts the stock reservation into a permanent deduction
    /// and transitions the order to `Completed`.
    ///
    /// A matching (user, idempotency key) purchase record short-circuits with
    /// `freshly_completed == false`.
    fn complete_order(
        &self,
        order_ref: &OrderId,
        idempotency_key: Option<&str>,
    ) -> impl Future<Output = Result<CompletedOrder, OrderGatewayError>> + Send;

    /// Spends additional essence to shorten the wait on a `Placed` or `Scheduled` order. The
    /// new ETA is recomputed from the accumulated total spend, anchored at the order's creation
    /// time, so the result is independent of when the expedite lands.
    fn expedite_order(
        &self,
        order_ref: &OrderId,
        essence: Coins,
    ) -> impl Future<Output = Result<ExpeditedOrder, OrderGatewayError>> + Send;

    /// Cancels a `Placed` or `Scheduled` order, refunding the deposit less the cancellation fee
    /// (the fee only applies when stock had been reserved) and releasing any reservation.
    fn cancel_order(&self, order_ref: &OrderId) -> impl Future<Output = Result<CancelledOrder, OrderGatewayError>> + Send;

    /// Reconciliation pass 1: tries to reserve stock for back-ordered (`Placed`) orders,
    /// oldest first, advancing each success to `Scheduled`. Returns the promoted orders.
    fn promote_backorders(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<Order>, OrderGatewayError>> + Send;

    /// Reconciliation pass 2: moves `Scheduled` orders whose ETA has passed to
    /// `ReadyForPickup`, stamping the pickup deadline. Returns the released orders.
    fn release_due_orders(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<Order>, OrderGatewayError>> + Send;

    /// Reconciliation pass 3: forfeits `ReadyForPickup` orders whose pickup window has lapsed,
    /// refunding the deposit less the forfeiture fee and releasing the reservation.
    fn forfeit_lapsed_orders(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<Order>, OrderGatewayError>> + Send;

    /// Attempts to take the named cluster-wide advisory lock. Returns `false` (without
    /// blocking) when another live holder has it. The TTL bounds how long a crashed holder can
    /// keep the lock wedged.
    fn try_acquire_named_lock(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, OrderGatewayError>> + Send;

    /// Releases the named advisory lock if (and only if) `holder` still owns it.
    fn release_named_lock(&self, name: &str, holder: &str) -> impl Future<Output = Result<(), OrderGatewayError>> + Send;
}
