//! SQLite backend for the clinic appointment engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The single connection thread also
//! serialises writes, and every status change is a conditional `UPDATE` inside
//! a transaction, so concurrent transitions on one appointment cannot both win.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
