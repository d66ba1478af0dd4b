//! # Depot reconciliation daemon
//!
//! This crate hosts the long-running process that keeps the Depot order book moving. It is
//! responsible for:
//! * Promoting back-ordered deposits to the fulfillment queue when stock returns.
//! * Releasing orders whose lead time has elapsed for pickup.
//! * Forfeiting orders whose pickup window has lapsed.
//!
//! Only one instance actually performs a cycle at a time: each instance competes for a named
//! advisory lock in the database, and the losers simply sleep until the next tick. The game's
//! client-facing traffic (order placement, pickup, cancellation) goes through the session layer,
//! which calls the engine directly; the daemon only ever drives time-based transitions.
//!
//! ## Configuration
//! The daemon is configured via environment variables. See [config](config/index.html) for more
//! information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod reconciler;
