use std::path::Path;

use depot_common::{Coins, Currency};
use depot_engine::{
    db_types::{CatalogItem, NewCatalogItem},
    BalanceManagement,
    CatalogManagement,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_depot_{}", rand::random::<u64>())
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

pub async fn seed_item(db: &SqliteDatabase, item: NewCatalogItem) -> CatalogItem {
    db.insert_item(item).await.expect("Error seeding catalog item")
}

pub async fn seed_balance(db: &SqliteDatabase, user_id: i64, currency: Currency, amount: Coins) {
    db.credit(user_id, currency, amount, "test seed", None).await.expect("Error seeding balance");
}
