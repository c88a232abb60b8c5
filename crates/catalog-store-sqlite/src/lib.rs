//! SQLite backends for the incoming feed and the staged product store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod incoming;
mod schema;
mod staged;

pub mod error;
pub mod statement;

pub use error::{Error, Result};
pub use incoming::SqliteIncoming;
pub use staged::SqliteStaged;
