use chrono::{DateTime, Duration, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::traits::OrderGatewayError;

/// Tries to take the named advisory lock for `holder` until `now + ttl`.
///
/// Expired rows are swept first, then a single conditional insert decides the winner. A holder
/// that already owns the lock refreshes its expiry and wins again, so a worker whose cycle runs
/// long does not lose its own lock mid-cycle.
pub async fn try_acquire(
    name: &str,
    holder: &str,
    ttl: Duration,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderGatewayError> {
    sqlx::query("DELETE FROM advisory_locks WHERE name = $1 AND expires_at <= $2")
        .bind(name)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    let expires_at = now + ttl;
    let result = sqlx::query(
        r#"INSERT INTO advisory_locks (name, holder, acquired_at, expires_at) VALUES ($1, $2, $3, $4)
           ON CONFLICT (name) DO UPDATE SET expires_at = excluded.expires_at
           WHERE advisory_locks.holder = excluded.holder"#,
    )
    .bind(name)
    .bind(holder)
    .bind(now)
    .bind(expires_at)
    .execute(conn)
    .await?;
    let acquired = result.rows_affected() > 0;
    if acquired {
        debug!("🔒️ Lock '{name}' acquired by {holder} until {expires_at}");
    } else {
        debug!("🔒️ Lock '{name}' is held elsewhere; {holder} skips this cycle");
    }
    Ok(acquired)
}

/// Releases the lock if `holder` still owns it. Releasing a lock someone else holds is a no-op.
pub async fn release(name: &str, holder: &str, conn: &mut SqliteConnection) -> Result<(), OrderGatewayError> {
    sqlx::query("DELETE FROM advisory_locks WHERE name = $1 AND holder = $2")
        .bind(name)
        .bind(holder)
        .execute(conn)
        .await?;
    Ok(())
}
