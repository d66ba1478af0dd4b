use crate::{
    db_types::{CatalogItem, NewCatalogItem, StockLedgerEntry},
    traits::OrderGatewayError,
};

/// Read surface over the catalog, plus the restock entry point.
///
/// The catalog's admin CRUD lives in another service; `insert_item` exists for seeding and
/// tests only. Restocks go through the stock ledger (a positive `Restock` delta) so that the
/// back-order promotion pass can pick them up.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_item(&self, item_id: i64) -> Result<Option<CatalogItem>, OrderGatewayError>;

    async fn insert_item(&self, item: NewCatalogItem) -> Result<CatalogItem, OrderGatewayError>;

    /// Appends a `Restock` ledger entry adding `quantity` units to the item's available pool.
    async fn restock_item(&self, item_id: i64, quantity: i64) -> Result<StockLedgerEntry, OrderGatewayError>;
}
