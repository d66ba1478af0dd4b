//! Shared scaffolding for integration tests: a throwaway migrated database per test, and
//! helpers to seed the catalog and player balances.
pub mod prepare_env;

pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations, seed_balance, seed_item};
