//! SQLite backend for the Depot order engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
