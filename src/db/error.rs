//! Data-access error type
//!
//! One variant per classification kind (success flows through `Result`).
//! Messages are `Cow<'static, str>` so the fixed sentinels ("out of
//! memory", "unknown error") never allocate: `Cow::Borrowed` plays the role
//! of a static sentinel and `Cow::Owned` the role of a heap message freed
//! on drop.

use std::borrow::Cow;

use thiserror::Error;

use crate::movie::BuilderError;

use super::classify::ErrorKind;

/// Sentinel used when the allocator itself is the problem.
pub const OUT_OF_MEMORY: &str = "out of memory";

/// Sentinel for failures the engine reported without a message.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Result alias for the data-access layer.
pub type DbResult<T> = Result<T, DbError>;

/// A classified data-access failure.
#[derive(Debug, Error)]
pub enum DbError {
    /// Caller-attributable; the session continues.
    #[error("{0}")]
    User(Cow<'static, str>),

    /// Transient; the caller may retry the whole operation.
    #[error("{0}")]
    Runtime(Cow<'static, str>),

    /// Unrecoverable for this worker; the worker exits after the session.
    #[error("{0}")]
    Hard(Cow<'static, str>),
}

impl DbError {
    pub fn user(message: impl Into<Cow<'static, str>>) -> Self {
        DbError::User(message.into())
    }

    pub fn runtime(message: impl Into<Cow<'static, str>>) -> Self {
        DbError::Runtime(message.into())
    }

    pub fn hard(message: impl Into<Cow<'static, str>>) -> Self {
        DbError::Hard(message.into())
    }

    /// The classification kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::User(_) => ErrorKind::User,
            DbError::Runtime(_) => ErrorKind::Runtime,
            DbError::Hard(_) => ErrorKind::Hard,
        }
    }

    /// Whether the owning worker must abort.
    pub fn is_hard(&self) -> bool {
        matches!(self, DbError::Hard(_))
    }

    /// Wrap an engine failure in the given kind, keeping its message.
    fn classified(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Runtime => DbError::Runtime(message.into()),
            ErrorKind::Hard => DbError::Hard(message.into()),
            // `Success` cannot reach here through an `Err`; treat it like
            // the default caller-error bucket.
            ErrorKind::User | ErrorKind::Success => DbError::User(message.into()),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(cause, message) => {
                let text = message
                    .clone()
                    .unwrap_or_else(|| cause.to_string());
                DbError::classified(ErrorKind::of(cause.extended_code), text)
            }
            // API-level failures (type mismatches on our fixed schema,
            // statement misuse) mean the store or this code is broken.
            _ => DbError::Hard(err.to_string().into()),
        }
    }
}

impl From<rusqlite::types::FromSqlError> for DbError {
    fn from(err: rusqlite::types::FromSqlError) -> Self {
        DbError::Hard(err.to_string().into())
    }
}

impl From<BuilderError> for DbError {
    fn from(err: BuilderError) -> Self {
        match err {
            BuilderError::OutOfMemory => DbError::Runtime(Cow::Borrowed(OUT_OF_MEMORY)),
            BuilderError::TooLarge => DbError::Runtime(Cow::Borrowed("record too large")),
        }
    }
}
