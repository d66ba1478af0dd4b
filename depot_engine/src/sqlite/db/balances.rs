use depot_common::{Coins, Currency};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Balance, OrderId},
    traits::OrderGatewayError,
};

/// Fetches the balance row for the user/currency pair, creating a zero balance if none exists.
pub async fn fetch_or_create(
    user_id: i64,
    currency: Currency,
    conn: &mut SqliteConnection,
) -> Result<Balance, OrderGatewayError> {
    sqlx::query("INSERT OR IGNORE INTO balances (user_id, currency, balance) VALUES ($1, $2, 0)")
        .bind(user_id)
        .bind(currency.to_string())
        .execute(&mut *conn)
        .await?;
    let balance = sqlx::query_as("SELECT * FROM balances WHERE user_id = $1 AND currency = $2")
        .bind(user_id)
        .bind(currency.to_string())
        .fetch_one(conn)
        .await?;
    Ok(balance)
}

pub async fn has_enough(
    user_id: i64,
    currency: Currency,
    amount: Coins,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderGatewayError> {
    if amount.is_zero() || amount.is_negative() {
        return Ok(true);
    }
    let balance = fetch_or_create(user_id, currency, conn).await?;
    Ok(balance.balance >= amount)
}

/// Adds `amount` to the balance and writes the audit row.
pub async fn credit(
    user_id: i64,
    currency: Currency,
    amount: Coins,
    reason: &str,
    order_ref: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<Balance, OrderGatewayError> {
    if amount.is_negative() {
        return Err(OrderGatewayError::InvalidAmount(format!("cannot credit a negative amount ({amount})")));
    }
    if amount.is_zero() {
        return fetch_or_create(user_id, currency, conn).await;
    }
    fetch_or_create(user_id, currency, &mut *conn).await?;
    let balance: Balance = sqlx::query_as(
        r#"UPDATE balances SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP
           WHERE user_id = $2 AND currency = $3 RETURNING *"#,
    )
    .bind(amount)
    .bind(user_id)
    .bind(currency.to_string())
    .fetch_one(&mut *conn)
    .await?;
    write_log(user_id, currency, amount, reason, order_ref, conn).await?;
    debug!("💰️ Credited {amount} {currency} to user {user_id} ({reason})");
    Ok(balance)
}

/// Subtracts `amount` from the balance. The decrement is conditional on the balance covering
/// it; zero rows affected means the funds were not there, and nothing is written.
pub async fn debit(
    user_id: i64,
    currency: Currency,
    amount: Coins,
    reason: &str,
    order_ref: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<Balance, OrderGatewayError> {
    if amount.is_negative() {
        return Err(OrderGatewayError::InvalidAmount(format!("cannot debit a negative amount ({amount})")));
    }
    if amount.is_zero() {
        return fetch_or_create(user_id, currency, conn).await;
    }
    fetch_or_create(user_id, currency, &mut *conn).await?;
    let balance: Option<Balance> = sqlx::query_as(
        r#"UPDATE balances SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
           WHERE user_id = $2 AND currency = $3 AND balance >= $1 RETURNING *"#,
    )
    .bind(amount)
    .bind(user_id)
    .bind(currency.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    let balance = balance.ok_or(OrderGatewayError::InsufficientFunds(currency))?;
    write_log(user_id, currency, -amount, reason, order_ref, conn).await?;
    debug!("💰️ Debited {amount} {currency} from user {user_id} ({reason})");
    Ok(balance)
}

async fn write_log(
    user_id: i64,
    currency: Currency,
    delta: Coins,
    reason: &str,
    order_ref: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderGatewayError> {
    sqlx::query("INSERT INTO balance_log (user_id, currency, delta, reason, order_ref) VALUES ($1, $2, $3, $4, $5)")
        .bind(user_id)
        .bind(currency.to_string())
        .bind(delta)
        .bind(reason)
        .bind(order_ref.map(|r| r.as_str().to_string()))
        .execute(conn)
        .await?;
    Ok(())
}
