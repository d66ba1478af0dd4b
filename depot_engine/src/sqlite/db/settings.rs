use log::warn;
use sqlx::SqliteConnection;

use crate::{
    helpers::{keys, EconomyTuning},
    traits::OrderGatewayError,
};

pub async fn get_value(key: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT value FROM settings WHERE key = $1").bind(key).fetch_optional(conn).await
}

/// Integer setting lookup. A missing key or a value that does not parse both yield `None`, so
/// callers always fall back to their hardcoded default.
pub async fn get_int(key: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, OrderGatewayError> {
    let value = get_value(key, conn).await?;
    Ok(value.and_then(|v| {
        v.trim().parse::<i64>().map_err(|e| warn!("⚙️ Setting {key} is not an integer ({v}): {e}")).ok()
    }))
}

pub async fn get_float(key: &str, conn: &mut SqliteConnection) -> Result<Option<f64>, OrderGatewayError> {
    let value = get_value(key, conn).await?;
    Ok(value.and_then(|v| {
        v.trim().parse::<f64>().map_err(|e| warn!("⚙️ Setting {key} is not a number ({v}): {e}")).ok()
    }))
}

pub async fn set_value(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<(), OrderGatewayError> {
    sqlx::query(
        r#"INSERT INTO settings (key, value) VALUES ($1, $2)
           ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP"#,
    )
    .bind(key)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}

/// Loads the economy tuning snapshot, overriding the hardcoded fallbacks with whichever keys
/// are present and well-formed.
pub async fn load_tuning(conn: &mut SqliteConnection) -> Result<EconomyTuning, OrderGatewayError> {
    let mut tuning = EconomyTuning::default();
    let deposit = |tier: &str| format!("{}{tier}", keys::DEPOSIT_PCT_PREFIX);
    let eta = |tier: &str| format!("{}{tier}", keys::ETA_BASE_MINUTES_PREFIX);

    if let Some(v) = get_int(&deposit("common"), &mut *conn).await? {
        tuning.deposit_pct_common = v;
    }
    if let Some(v) = get_int(&deposit("rare"), &mut *conn).await? {
        tuning.deposit_pct_rare = v;
    }
    if let Some(v) = get_int(&deposit("epic"), &mut *conn).await? {
        tuning.deposit_pct_epic = v;
    }
    if let Some(v) = get_int(&deposit("legendary"), &mut *conn).await? {
        tuning.deposit_pct_legendary = v;
    }
    if let Some(v) = get_int(&eta("common"), &mut *conn).await? {
        tuning.eta_minutes_common = v;
    }
    if let Some(v) = get_int(&eta("rare"), &mut *conn).await? {
        tuning.eta_minutes_rare = v;
    }
    if let Some(v) = get_int(&eta("epic"), &mut *conn).await? {
        tuning.eta_minutes_epic = v;
    }
    if let Some(v) = get_int(&eta("legendary"), &mut *conn).await? {
        tuning.eta_minutes_legendary = v;
    }
    if let Some(v) = get_int(&eta("default"), &mut *conn).await? {
        tuning.eta_minutes_default = v;
    }
    if let Some(v) = get_float(keys::EXPEDITE_K, &mut *conn).await? {
        tuning.expedite_k = v;
    }
    if let Some(v) = get_int(keys::EXPEDITE_CAP_PCT, &mut *conn).await? {
        tuning.expedite_cap_pct = v;
    }
    if let Some(v) = get_int(keys::PICKUP_WINDOW_HOURS, &mut *conn).await? {
        tuning.pickup_window_hours = v;
    }
    if let Some(v) = get_int(keys::CANCEL_FEE_PCT, &mut *conn).await? {
        tuning.cancel_fee_pct = v;
    }
    if let Some(v) = get_int(keys::FORFEIT_FEE_PCT, &mut *conn).await? {
        tuning.forfeit_fee_pct = v;
    }
    if let Some(v) = get_int(keys::MAX_OPEN_ORDERS, &mut *conn).await? {
        tuning.max_open_orders = v;
    }
    if let Some(v) = get_int(keys::MAX_OPEN_PER_ITEM, &mut *conn).await? {
        tuning.max_open_per_item = v;
    }
    Ok(tuning)
}
