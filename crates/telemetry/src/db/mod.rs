//! Database layer for reading storage.
//!
//! This module provides the SQLite-backed implementation of the `ReadingStore` trait.
//! Both tables live in a single database file created on first start.

pub mod models;
pub mod sqlite;

pub use models::*;
pub use sqlite::SqliteReadingStore;
