//! Error types for CineVault
//!
//! The library-level error wraps the classified data-access error and the
//! failures of the surrounding shell (I/O, configuration, networking).

use thiserror::Error;

use crate::db::DbError;

/// Result type alias using [`CineError`].
pub type Result<T> = std::result::Result<T, CineError>;

/// Unified error type for the server shell.
#[derive(Debug, Error)]
pub enum CineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A classified store failure; see [`DbError::kind`].
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),
}
