//! SQLite backend for Tryst.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements every
//! storage trait of `tryst-core`, plus the local conversation registry and
//! compatibility feed.

mod collab;
mod encode;
mod reputation;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
