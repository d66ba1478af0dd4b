//! # Storage backend contracts.
//!
//! This module defines the interface contracts that a storage backend must satisfy to drive the
//! Depot order engine.
//!
//! ## Traits
//! * [`OrderGatewayDatabase`] is the highest level of behaviour: the atomic order operations
//!   (create, complete, expedite, cancel), the reconciliation passes, and the cluster-wide
//!   advisory lock. Every multi-step mutation behind these methods executes inside a single
//!   transaction.
//! * [`OrderManagement`] provides read-side queries over orders and stock.
//! * [`BalanceManagement`] is the per-user, per-currency balance ledger. Every mutation is
//!   paired with an audit log row.
//! * [`CatalogManagement`] is the read surface over catalog items, plus the restock entry point
//!   that feeds the stock ledger.
//! * [`SettingsManagement`] exposes the keyed tunables consulted by the formulas.
//! * [`InventoryManagement`] counts the inventory grants minted at completion.
mod balance_management;
mod catalog_management;
mod inventory_management;
mod order_gateway_database;
mod order_management;
mod settings_management;

pub use balance_management::BalanceManagement;
pub use catalog_management::CatalogManagement;
pub use inventory_management::InventoryManagement;
pub use order_gateway_database::{OrderGatewayDatabase, OrderGatewayError};
pub use order_management::OrderManagement;
pub use settings_management::SettingsManagement;
