//! Depot Order Engine
//!
//! The Depot engine is the economy core for a location-based mobile game. Players place a
//! back-order for a catalog item by paying a deposit up front, wait out a rarity-dependent lead
//! time (optionally shortened by spending essence), and then pick the order up within a limited
//! window, paying the balance due. Stock is a shared, contended resource, and a background
//! reconciliation pass advances orders through their time-based states.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the
//!    data types used in the database. These are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@api`]). [`OrderFlowApi`] carries the caller-driven operations
//!    (create, list, complete, expedite, cancel) and [`ReconciliationApi`] carries the periodic
//!    background passes. Specific backends need to implement the traits in the [`mod@traits`]
//!    module in order to act as a storage backend for the engine.
mod api;

pub mod db_types;
pub mod helpers;
pub mod order_objects;
mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use api::{order_flow_api::OrderFlowApi, reconciliation_api::ReconciliationApi};
pub use traits::{
    BalanceManagement,
    CatalogManagement,
    InventoryManagement,
    OrderGatewayDatabase,
    OrderGatewayError,
    OrderManagement,
    SettingsManagement,
};
