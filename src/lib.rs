//! # CineVault
//!
//! A concurrent TCP server for movie records: YAML-framed requests over
//! stream sockets, an embedded SQLite store, human-readable responses.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TCP Listener                           │
//! │               (accept loop, single thread)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ owned client sockets
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Work Queue (bounded SPMC)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!        ┌──────────────┼──────────────┐
//!        ▼              ▼              ▼
//!  ┌──────────┐   ┌──────────┐   ┌──────────┐
//!  │ Worker 0 │   │ Worker 1 │   │ Worker N │   one thread each,
//!  │ Parser   │   │ Parser   │   │ Parser   │   private YAML parser
//!  │ Db+Build │   │ Db+Build │   │ Db+Build │   and store connection
//!  └────┬─────┘   └────┬─────┘   └────┬─────┘
//!       └──────────────┴──────────────┘
//!                      ▼
//!               SQLite store file
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod db;
pub mod movie;
pub mod network;
pub mod protocol;
pub mod worker;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use db::Db;
pub use error::{CineError, Result};
pub use network::Server;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CineVault.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
