use crate::{
    db_types::{Order, OrderId},
    order_objects::{OrderQueryFilter, OrderSummary},
    traits::OrderGatewayError,
};

/// Read-side queries over orders and stock.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches an order by its public reference.
    async fn fetch_order(&self, order_ref: &OrderId) -> Result<Option<Order>, OrderGatewayError>;

    /// Fetches a user's orders, optionally filtered and paginated, annotated with the item's
    /// name/type and the millisecond countdowns to readiness and pickup expiry.
    async fn orders_for_user(
        &self,
        user_id: i64,
        filter: OrderQueryFilter,
    ) -> Result<Vec<OrderSummary>, OrderGatewayError>;

    /// Currently-available stock for an item: base stock plus the sum of its ledger deltas.
    async fn available_stock(&self, item_id: i64) -> Result<i64, OrderGatewayError>;
}
