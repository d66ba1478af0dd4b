use chrono::{DateTime, Utc};
use depot_common::Coins;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderState},
    order_objects::OrderQueryFilter,
    traits::OrderGatewayError,
};

/// Inserts a new order into the database using the given connection. This is not atomic on its
/// own. Embed this call inside a transaction and pass `&mut *tx` as the connection argument to
/// make it part of a larger atomic unit.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderGatewayError> {
    let user_id = order.user_id;
    let key = order.idempotency_key.clone().unwrap_or_default();
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_ref,
                user_id,
                item_id,
                quantity,
                deposit_pct,
                deposit_credits,
                deposit_essence,
                expedite_spend,
                price_credits,
                price_essence,
                eta_at,
                idempotency_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order.order_ref)
    .bind(order.user_id)
    .bind(order.item_id)
    .bind(order.quantity)
    .bind(order.deposit_pct)
    .bind(order.deposit_credits)
    .bind(order.deposit_essence)
    .bind(order.expedite_spend)
    .bind(order.price_credits)
    .bind(order.price_essence)
    .bind(order.eta_at)
    .bind(order.idempotency_key)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            OrderGatewayError::OrderAlreadyExists(user_id, key)
        },
        _ => OrderGatewayError::from(e),
    })?;
    Ok(inserted)
}

pub async fn fetch_order_by_ref(order_ref: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_ref = $1")
        .bind(order_ref.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Looks up the order a (user, idempotency key) pair maps to, if any. This is the re-read half
/// of the creation idempotency check.
pub async fn fetch_order_by_idempotency_key(
    user_id: i64,
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 AND idempotency_key = $2")
        .bind(user_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Fetches a user's orders according to the criteria in the `OrderQueryFilter`, newest first.
pub async fn search_orders(
    user_id: i64,
    query: &OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE user_id = ");
    builder.push_bind(user_id);
    if let Some(item_id) = query.item_id {
        builder.push(" AND item_id = ");
        builder.push_bind(item_id);
    }
    if let Some(states) = query.states.as_ref().filter(|s| !s.is_empty()) {
        // OrderState renders to a fixed set of identifiers, so inlining is safe here.
        let states = states.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        builder.push(format!(" AND state IN ({states})"));
    }
    if let Some(since) = query.since {
        builder.push(" AND created_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = query.until {
        builder.push(" AND created_at <= ");
        builder.push_bind(until);
    }
    builder.push(" ORDER BY created_at DESC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset.unwrap_or(0));
    }
    trace!("📦️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📦️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

/// Compare-and-set state transition. Returns `None` when the order was not in `from` anymore —
/// a concurrent transition got there first, which callers treat as a no-op, not an error.
pub async fn transition_state(
    id: i64,
    from: OrderState,
    to: OrderState,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET state = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND state = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(id)
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    if result.is_some() {
        debug!("📦️ Order id {id} moved {from} → {to}");
    }
    Ok(result)
}

/// Moves a `Scheduled` order to `ReadyForPickup`, stamping the pickup deadline in the same
/// statement.
pub async fn mark_ready(
    id: i64,
    pickup_expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"UPDATE orders SET state = 'ReadyForPickup', pickup_expires_at = $1, updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND state = 'Scheduled' RETURNING *"#,
    )
    .bind(pickup_expires_at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Records an expedite: the accumulated spend and the recomputed ETA. Conditional on the order
/// still being open.
pub async fn apply_expedite(
    id: i64,
    total_spend: Coins,
    new_eta: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"UPDATE orders SET expedite_spend = $1, eta_at = $2, updated_at = CURRENT_TIMESTAMP
           WHERE id = $3 AND state IN ('Placed', 'Scheduled') RETURNING *"#,
    )
    .bind(total_spend)
    .bind(new_eta)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// `Scheduled` orders whose ETA has passed, oldest deadline first.
pub async fn due_scheduled(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE state = 'Scheduled' AND eta_at <= $1 ORDER BY eta_at ASC")
        .bind(now)
        .fetch_all(conn)
        .await
}

/// `ReadyForPickup` orders whose pickup window has lapsed.
pub async fn lapsed_ready(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders WHERE state = 'ReadyForPickup' AND pickup_expires_at < $1 ORDER BY pickup_expires_at ASC",
    )
    .bind(now)
    .fetch_all(conn)
    .await
}

/// Back-ordered (`Placed`) orders, oldest first, so long-waiting players get stock first.
pub async fn placed_backorders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE state = 'Placed' ORDER BY created_at ASC, id ASC")
        .fetch_all(conn)
        .await
}

/// Number of open (Placed or Scheduled) orders the user currently holds.
pub async fn count_open_orders(user_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1 AND state IN ('Placed', 'Scheduled')")
            .bind(user_id)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

/// Number of open orders the user holds for one specific item.
pub async fn count_open_orders_for_item(
    user_id: i64,
    item_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND item_id = $2 AND state IN ('Placed', 'Scheduled')",
    )
    .bind(user_id)
    .bind(item_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}
