//! SQLite storage backend for the BioPay engine.
//!
//! Schema migrations live in `migrations/` and are embedded at compile time. Call [`SqliteDatabase::migrate`] once
//! after opening a database.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
