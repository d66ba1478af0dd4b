//! The public engine API. Server code talks to these wrappers rather than the storage traits
//! directly, so logging and cross-cutting behaviour live in one place.
pub mod order_flow_api;
pub mod reconciliation_api;
