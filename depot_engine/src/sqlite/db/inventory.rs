use sqlx::SqliteConnection;

use crate::{db_types::OrderId, traits::OrderGatewayError};

/// Mints `quantity` inventory grants, one row per unit.
pub async fn mint(
    user_id: i64,
    item_id: i64,
    order_ref: &OrderId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), OrderGatewayError> {
    if quantity <= 0 {
        return Err(OrderGatewayError::InvalidAmount("mint quantity must be positive".to_string()));
    }
    for _ in 0..quantity {
        sqlx::query("INSERT INTO inventory (user_id, item_id, order_ref) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(item_id)
            .bind(order_ref.as_str())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn count(user_id: i64, item_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory WHERE user_id = $1 AND item_id = $2")
        .bind(user_id)
        .bind(item_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}
