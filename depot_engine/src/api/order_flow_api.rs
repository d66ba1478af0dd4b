use std::fmt::Debug;

use depot_common::Coins;
use log::*;

use crate::{
    db_types::{Order, OrderId},
    order_objects::{
        CancelledOrder,
        CompletedOrder,
        CreateOrderRequest,
        CreatedOrder,
        ExpeditedOrder,
        OrderQueryFilter,
        OrderSummary,
    },
    traits::{OrderGatewayDatabase, OrderGatewayError, OrderManagement},
};

/// `OrderFlowApi` is the primary API for handling caller-driven order flows: placing a deposit
/// order, browsing open orders, paying the balance at pickup, spending essence to pull the ETA
/// in, and cancelling.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderFlowApi<B>
where B: OrderGatewayDatabase
{
    /// Submit a new deposit order.
    ///
    /// The request is validated against the catalog, the player's profile and the purchase caps,
    /// the deposit (and any up-front expedite spend) is debited, and stock is reserved. When the
    /// item is back-orderable and out of stock, the order is accepted in `Placed` and will be
    /// scheduled by the reconciliation pass once stock returns. The whole flow is atomic: any
    /// failure leaves no order and no charge behind.
    ///
    /// Replays carrying the same idempotency key return the original order with
    /// [`CreatedOrder::freshly_created`] set to false.
    pub async fn place_order(&self, req: CreateOrderRequest) -> Result<CreatedOrder, OrderGatewayError> {
        let result = self.db.create_order(req).await?;
        let order = &result.order;
        if result.freshly_created {
            info!(
                "📦️ Order {} placed: user {} ordered {} × item {} (deposit {} / {}, ETA {})",
                order.order_ref,
                order.user_id,
                order.quantity,
                order.item_id,
                order.deposit_credits,
                order.deposit_essence,
                order.eta_at
            );
        } else {
            debug!("📦️ Order {} replayed idempotently for user {}", order.order_ref, order.user_id);
        }
        Ok(result)
    }

    /// Fetch a single order by its public reference.
    pub async fn order(&self, order_ref: &OrderId) -> Result<Option<Order>, OrderGatewayError> {
        self.db.fetch_order(order_ref).await
    }

    /// The user's orders, annotated with item details and live countdowns.
    pub async fn orders_for_user(
        &self,
        user_id: i64,
        filter: OrderQueryFilter,
    ) -> Result<Vec<OrderSummary>, OrderGatewayError> {
        self.db.orders_for_user(user_id, filter).await
    }

    /// Pay the balance due and collect the goods. Only legal from `ReadyForPickup`.
    pub async fn complete_order(
        &self,
        order_ref: &OrderId,
        idempotency_key: Option<&str>,
    ) -> Result<CompletedOrder, OrderGatewayError> {
        let result = self.db.complete_order(order_ref, idempotency_key).await?;
        if result.freshly_completed {
            info!(
                "💰️ Order {} paid off: {} credits / {} essence, {} items minted",
                result.order.order_ref, result.paid_credits, result.paid_essence, result.items_minted
            );
        }
        Ok(result)
    }

    /// Spend essence to pull the order's ETA in. The reduction has diminishing returns and a hard
    /// cap, both tunable in settings.
    pub async fn expedite_order(&self, order_ref: &OrderId, essence: Coins) -> Result<ExpeditedOrder, OrderGatewayError> {
        self.db.expedite_order(order_ref, essence).await
    }

    /// Cancel an open order. Refunds the deposit, less the cancellation fee when stock was
    /// already reserved. The expedite spend is never refunded.
    pub async fn cancel_order(&self, order_ref: &OrderId) -> Result<CancelledOrder, OrderGatewayError> {
        self.db.cancel_order(order_ref).await
    }

    /// Units of an item currently available for reservation.
    pub async fn available_stock(&self, item_id: i64) -> Result<i64, OrderGatewayError> {
        self.db.available_stock(item_id).await
    }
}
