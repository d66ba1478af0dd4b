use chrono::{DateTime, Utc};
use depot_common::Coins;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, PurchaseRecord},
    traits::OrderGatewayError,
};

/// Writes the purchase record for a completed order.
pub async fn insert_purchase(
    user_id: i64,
    item_id: i64,
    quantity: i64,
    order_ref: &OrderId,
    paid_credits: Coins,
    paid_essence: Coins,
    idempotency_key: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<PurchaseRecord, OrderGatewayError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO purchases (user_id, item_id, quantity, order_ref, paid_credits, paid_essence, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(item_id)
    .bind(quantity)
    .bind(order_ref.as_str())
    .bind(paid_credits)
    .bind(paid_essence)
    .bind(idempotency_key)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

/// The re-read half of the completion idempotency check.
pub async fn fetch_by_idempotency_key(
    user_id: i64,
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PurchaseRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM purchases WHERE user_id = $1 AND idempotency_key = $2")
        .bind(user_id)
        .bind(key)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_by_order_ref(
    order_ref: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PurchaseRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM purchases WHERE order_ref = $1").bind(order_ref.as_str()).fetch_optional(conn).await
}

/// Total units of an item the user has completed purchases for since `since`. Feeds the
/// daily/weekly velocity caps.
pub async fn quantity_since(
    user_id: i64,
    item_id: i64,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM purchases WHERE user_id = $1 AND item_id = $2 AND created_at >= $3",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

/// Total units of an item the user has ever purchased. Feeds the lifetime cap.
pub async fn lifetime_quantity(user_id: i64, item_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM purchases WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .fetch_one(conn)
            .await?;
    Ok(total)
}
