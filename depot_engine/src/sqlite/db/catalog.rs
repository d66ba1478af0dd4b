use sqlx::SqliteConnection;

use crate::{
    db_types::{CatalogItem, NewCatalogItem},
    traits::OrderGatewayError,
};

pub async fn fetch_item(item_id: i64, conn: &mut SqliteConnection) -> Result<Option<CatalogItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM catalog_items WHERE id = $1").bind(item_id).fetch_optional(conn).await
}

/// Inserts a catalog row. The production catalog is maintained elsewhere; this exists for the
/// seed/admin surface and tests.
pub async fn insert_item(item: NewCatalogItem, conn: &mut SqliteConnection) -> Result<CatalogItem, OrderGatewayError> {
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO catalog_items (
                name,
                item_type,
                rarity,
                price_credits,
                price_essence,
                stock,
                limited_stock,
                backorder,
                active,
                available_from,
                available_until,
                min_tier,
                min_level,
                daily_limit,
                weekly_limit,
                lifetime_limit
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *;
        "#,
    )
    .bind(item.name)
    .bind(item.item_type)
    .bind(item.rarity)
    .bind(item.price_credits)
    .bind(item.price_essence)
    .bind(item.stock)
    .bind(item.limited_stock)
    .bind(item.backorder)
    .bind(item.active)
    .bind(item.available_from)
    .bind(item.available_until)
    .bind(item.min_tier)
    .bind(item.min_level)
    .bind(item.daily_limit)
    .bind(item.weekly_limit)
    .bind(item.lifetime_limit)
    .fetch_one(conn)
    .await?;
    Ok(inserted)
}
