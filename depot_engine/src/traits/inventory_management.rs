use crate::traits::OrderGatewayError;

/// Counts the inventory grants minted at order completion. Minting itself happens inside the
/// completion transaction and is not separately exposed.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn inventory_count(&self, user_id: i64, item_id: i64) -> Result<i64, OrderGatewayError>;
}
