//! Data-Access Module
//!
//! Synchronous API over the embedded SQLite store.
//!
//! ## Architecture
//! - One [`Db`] per worker thread, never shared
//! - Full statement catalog prepared at connect time
//! - Explicit deferred transactions around every operation
//! - Streaming reads through borrow-protocol visitors
//! - Errors classified into user / transient / hard kinds

mod classify;
mod connection;
mod error;
mod schema;

pub use classify::ErrorKind;
pub use connection::{setup, Db};
pub use error::{DbError, DbResult, OUT_OF_MEMORY, UNKNOWN_ERROR};
pub use schema::SCHEMA;
