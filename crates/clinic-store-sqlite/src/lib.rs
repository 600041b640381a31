//! SQLite backend for the clinic client store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every call is executed on that single
//! thread in order, and read-modify-write operations additionally run inside
//! an `IMMEDIATE` transaction so they stay atomic against other processes
//! sharing the file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
