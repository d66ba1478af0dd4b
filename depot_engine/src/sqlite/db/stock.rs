use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, StockLedgerEntry, StockReason},
    traits::OrderGatewayError,
};

/// The outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// A fresh `Reserve` entry was appended.
    Reserved,
    /// A reservation for this order already exists; nothing was written.
    AlreadyReserved,
    /// The available pool could not cover the quantity; nothing was written.
    Insufficient,
}

/// Currently-available stock: the item's base stock plus the sum of its ledger deltas.
/// Returns `None` when the item does not exist.
pub async fn available_stock(item_id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let available: Option<i64> = sqlx::query_scalar(
        r#"SELECT stock + COALESCE((SELECT SUM(delta) FROM stock_ledger WHERE item_id = $1), 0)
           FROM catalog_items WHERE id = $1"#,
    )
    .bind(item_id)
    .fetch_optional(conn)
    .await?;
    Ok(available)
}

pub async fn entry_exists(
    order_ref: &OrderId,
    reason: StockReason,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_ledger WHERE order_ref = $1 AND reason = $2")
        .bind(order_ref.as_str())
        .bind(reason.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Appends a ledger entry. The ledger is append-only and zero deltas are meaningless, so they
/// are rejected before touching the database.
pub async fn insert_entry(
    item_id: i64,
    delta: i64,
    reason: StockReason,
    order_ref: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<StockLedgerEntry, OrderGatewayError> {
    if delta == 0 {
        return Err(OrderGatewayError::InvalidAmount("stock ledger delta may not be zero".to_string()));
    }
    let entry = sqlx::query_as(
        "INSERT INTO stock_ledger (item_id, delta, reason, order_ref) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(item_id)
    .bind(delta)
    .bind(reason.to_string())
    .bind(order_ref.map(|r| r.as_str().to_string()))
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// Tries to reserve `quantity` units for an order.
///
/// The availability check and the insert are one conditional statement, so two concurrent
/// reservations can never both draw down the same units: the loser's insert affects zero rows
/// and reports `Insufficient`. When `enforce_stock` is false (unlimited items) the entry is
/// appended unconditionally; the reservation still exists so that cancellation and completion
/// stay symmetric.
pub async fn try_reserve(
    item_id: i64,
    quantity: i64,
    order_ref: &OrderId,
    enforce_stock: bool,
    conn: &mut SqliteConnection,
) -> Result<ReserveOutcome, OrderGatewayError> {
    if quantity <= 0 {
        return Err(OrderGatewayError::InvalidAmount("reservation quantity must be positive".to_string()));
    }
    if entry_exists(order_ref, StockReason::Reserve, &mut *conn).await? {
        return Ok(ReserveOutcome::AlreadyReserved);
    }
    if !enforce_stock {
        insert_entry(item_id, -quantity, StockReason::Reserve, Some(order_ref), conn).await?;
        return Ok(ReserveOutcome::Reserved);
    }
    let result = sqlx::query(
        r#"INSERT INTO stock_ledger (item_id, delta, reason, order_ref)
           SELECT $1, -$2, 'Reserve', $3
           WHERE (SELECT stock + COALESCE((SELECT SUM(delta) FROM stock_ledger WHERE item_id = $1), 0)
                  FROM catalog_items WHERE id = $1) >= $2"#,
    )
    .bind(item_id)
    .bind(quantity)
    .bind(order_ref.as_str())
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        debug!("🧮️ Reservation for order {order_ref} found insufficient stock on item {item_id}");
        Ok(ReserveOutcome::Insufficient)
    } else {
        debug!("🧮️ Reserved {quantity} units of item {item_id} for order {order_ref}");
        Ok(ReserveOutcome::Reserved)
    }
}

/// Returns reserved units to the pool. Writes the `Release` entry only if a reservation exists
/// and has not already been released or sold, so a retried cancellation or forfeiture never
/// double-credits stock. Returns whether an entry was written.
pub async fn release_reservation(
    item_id: i64,
    quantity: i64,
    order_ref: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderGatewayError> {
    let result = sqlx::query(
        r#"INSERT INTO stock_ledger (item_id, delta, reason, order_ref)
           SELECT $1, $2, 'Release', $3
           WHERE EXISTS (SELECT 1 FROM stock_ledger WHERE order_ref = $3 AND reason = 'Reserve')
             AND NOT EXISTS (SELECT 1 FROM stock_ledger WHERE order_ref = $3 AND reason IN ('Release', 'Sale'))"#,
    )
    .bind(item_id)
    .bind(quantity)
    .bind(order_ref.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Converts a reservation into a permanent deduction at completion: a `Release` (+q) paired
/// with a `Sale` (−q) in the same transaction. Availability is unchanged — the units were
/// already consumed by the reservation — but the audit trail records the conversion. Idempotent
/// per order. Returns whether the pair was written.
pub async fn convert_reservation_to_sale(
    item_id: i64,
    quantity: i64,
    order_ref: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderGatewayError> {
    let result = sqlx::query(
        r#"INSERT INTO stock_ledger (item_id, delta, reason, order_ref)
           SELECT $1, $2, 'Release', $3
           WHERE EXISTS (SELECT 1 FROM stock_ledger WHERE order_ref = $3 AND reason = 'Reserve')
             AND NOT EXISTS (SELECT 1 FROM stock_ledger WHERE order_ref = $3 AND reason IN ('Release', 'Sale'))"#,
    )
    .bind(item_id)
    .bind(quantity)
    .bind(order_ref.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }
    insert_entry(item_id, -quantity, StockReason::Sale, Some(order_ref), conn).await?;
    Ok(true)
}

/// Operator top-up of the available pool.
pub async fn restock(
    item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<StockLedgerEntry, OrderGatewayError> {
    if quantity <= 0 {
        return Err(OrderGatewayError::InvalidAmount("restock quantity must be positive".to_string()));
    }
    insert_entry(item_id, quantity, StockReason::Restock, None, conn).await
}
