//! SQLite result-code classification
//!
//! Collapses the engine's extended result codes into four kinds that drive
//! retry and shutdown policy:
//!
//! - `Success`: the operation completed.
//! - `Runtime`: transient (busy, lock contention, I/O saturation, engine
//!   OOM, schema change); the caller may retry.
//! - `User`: caller-attributable (constraint violation, malformed input,
//!   range error); retrying will not help.
//! - `Hard`: unrecoverable for this worker (corruption, misuse, read-only,
//!   internal engine fault); the worker aborts after the current session.

use rusqlite::ffi;
use std::os::raw::c_int;

/// The four classification kinds. Ordering is not meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Success,
    Runtime,
    User,
    Hard,
}

impl ErrorKind {
    /// Classify a single extended result code.
    ///
    /// Unknown codes default to `User`, matching SQLite's convention that
    /// new codes extend the caller-error space.
    pub fn of(code: c_int) -> ErrorKind {
        match code {
            ffi::SQLITE_OK
            | ffi::SQLITE_DONE
            | ffi::SQLITE_OK_LOAD_PERMANENTLY
            | ffi::SQLITE_OK_SYMLINK => ErrorKind::Success,

            // Unrecoverable: corruption, misuse, permissions, or an engine
            // state this process cannot repair.
            ffi::SQLITE_CANTOPEN_CONVPATH
            | ffi::SQLITE_CANTOPEN_DIRTYWAL
            | ffi::SQLITE_CANTOPEN_FULLPATH
            | ffi::SQLITE_CANTOPEN_ISDIR
            | ffi::SQLITE_CANTOPEN_NOTEMPDIR
            | ffi::SQLITE_CANTOPEN_SYMLINK
            | ffi::SQLITE_CORRUPT
            | ffi::SQLITE_CORRUPT_INDEX
            | ffi::SQLITE_CORRUPT_SEQUENCE
            | ffi::SQLITE_CORRUPT_VTAB
            | ffi::SQLITE_INTERNAL
            | ffi::SQLITE_INTERRUPT
            | ffi::SQLITE_IOERR_AUTH
            | ffi::SQLITE_IOERR_BEGIN_ATOMIC
            | ffi::SQLITE_IOERR_BLOCKED
            | ffi::SQLITE_IOERR_CHECKRESERVEDLOCK
            | ffi::SQLITE_IOERR_CLOSE
            | ffi::SQLITE_IOERR_COMMIT_ATOMIC
            | ffi::SQLITE_IOERR_CONVPATH
            | ffi::SQLITE_IOERR_CORRUPTFS
            | ffi::SQLITE_IOERR_DATA
            | ffi::SQLITE_IOERR_DIR_CLOSE
            | ffi::SQLITE_IOERR_DIR_FSYNC
            | ffi::SQLITE_IOERR_FSTAT
            | ffi::SQLITE_IOERR_FSYNC
            | ffi::SQLITE_IOERR_GETTEMPPATH
            | ffi::SQLITE_IOERR_IN_PAGE
            | ffi::SQLITE_IOERR_LOCK
            | ffi::SQLITE_IOERR_MMAP
            | ffi::SQLITE_IOERR_READ
            | ffi::SQLITE_IOERR_ROLLBACK_ATOMIC
            | ffi::SQLITE_IOERR_SHORT_READ
            | ffi::SQLITE_IOERR_UNLOCK
            | ffi::SQLITE_IOERR_VNODE
            | ffi::SQLITE_IOERR_WRITE
            | ffi::SQLITE_MISUSE
            | ffi::SQLITE_NOTADB
            | ffi::SQLITE_NOTFOUND
            | ffi::SQLITE_PERM
            | ffi::SQLITE_READONLY
            | ffi::SQLITE_READONLY_CANTINIT
            | ffi::SQLITE_READONLY_CANTLOCK
            | ffi::SQLITE_READONLY_DBMOVED
            | ffi::SQLITE_READONLY_DIRECTORY
            | ffi::SQLITE_READONLY_RECOVERY
            | ffi::SQLITE_READONLY_ROLLBACK => ErrorKind::Hard,

            // Transient: contention, saturation, or a state that may clear
            // on its own.
            ffi::SQLITE_ABORT
            | ffi::SQLITE_ABORT_ROLLBACK
            | ffi::SQLITE_BUSY
            | ffi::SQLITE_BUSY_RECOVERY
            | ffi::SQLITE_BUSY_SNAPSHOT
            | ffi::SQLITE_BUSY_TIMEOUT
            | ffi::SQLITE_CANTOPEN
            | ffi::SQLITE_ERROR_RETRY
            | ffi::SQLITE_ERROR_SNAPSHOT
            | ffi::SQLITE_FULL
            | ffi::SQLITE_IOERR
            | ffi::SQLITE_IOERR_ACCESS
            | ffi::SQLITE_IOERR_DELETE
            | ffi::SQLITE_IOERR_DELETE_NOENT
            | ffi::SQLITE_IOERR_NOMEM
            | ffi::SQLITE_IOERR_RDLOCK
            | ffi::SQLITE_IOERR_SEEK
            | ffi::SQLITE_IOERR_SHMLOCK
            | ffi::SQLITE_IOERR_SHMMAP
            | ffi::SQLITE_IOERR_SHMOPEN
            | ffi::SQLITE_IOERR_SHMSIZE
            | ffi::SQLITE_IOERR_TRUNCATE
            | ffi::SQLITE_LOCKED
            | ffi::SQLITE_LOCKED_SHAREDCACHE
            | ffi::SQLITE_LOCKED_VTAB
            | ffi::SQLITE_NOLFS
            | ffi::SQLITE_NOMEM
            | ffi::SQLITE_PROTOCOL
            | ffi::SQLITE_ROW
            | ffi::SQLITE_SCHEMA => ErrorKind::Runtime,

            // Everything else (constraints, auth, range, format, notices,
            // warnings) is on the caller.
            _ => ErrorKind::User,
        }
    }

    /// Classify a step result together with the statement-reset result.
    ///
    /// A failed reset leaves the statement unusable for the cached
    /// statement set, so it dominates whatever the step reported.
    pub fn with_reset(code: c_int, reset_code: c_int) -> ErrorKind {
        if ErrorKind::of(reset_code) != ErrorKind::Success {
            return ErrorKind::Hard;
        }
        ErrorKind::of(code)
    }

    /// Classify a list of result codes, first failure wins.
    pub fn of_list(codes: &[c_int], reset_code: c_int) -> ErrorKind {
        for &code in codes {
            let kind = ErrorKind::with_reset(code, reset_code);
            if kind != ErrorKind::Success {
                return kind;
            }
        }
        ErrorKind::with_reset(ffi::SQLITE_OK, reset_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes() {
        assert_eq!(ErrorKind::of(ffi::SQLITE_OK), ErrorKind::Success);
        assert_eq!(ErrorKind::of(ffi::SQLITE_DONE), ErrorKind::Success);
    }

    #[test]
    fn test_constraints_are_user_errors() {
        assert_eq!(ErrorKind::of(ffi::SQLITE_CONSTRAINT), ErrorKind::User);
        assert_eq!(ErrorKind::of(ffi::SQLITE_CONSTRAINT_UNIQUE), ErrorKind::User);
        assert_eq!(
            ErrorKind::of(ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
            ErrorKind::User
        );
        assert_eq!(ErrorKind::of(ffi::SQLITE_RANGE), ErrorKind::User);
    }

    #[test]
    fn test_contention_is_transient() {
        assert_eq!(ErrorKind::of(ffi::SQLITE_BUSY), ErrorKind::Runtime);
        assert_eq!(ErrorKind::of(ffi::SQLITE_LOCKED), ErrorKind::Runtime);
        assert_eq!(ErrorKind::of(ffi::SQLITE_NOMEM), ErrorKind::Runtime);
    }

    #[test]
    fn test_corruption_is_hard() {
        assert_eq!(ErrorKind::of(ffi::SQLITE_CORRUPT), ErrorKind::Hard);
        assert_eq!(ErrorKind::of(ffi::SQLITE_MISUSE), ErrorKind::Hard);
        assert_eq!(ErrorKind::of(ffi::SQLITE_READONLY), ErrorKind::Hard);
    }

    #[test]
    fn test_failed_reset_dominates() {
        assert_eq!(
            ErrorKind::with_reset(ffi::SQLITE_OK, ffi::SQLITE_BUSY),
            ErrorKind::Hard
        );
        assert_eq!(
            ErrorKind::with_reset(ffi::SQLITE_CONSTRAINT, ffi::SQLITE_OK),
            ErrorKind::User
        );
    }

    #[test]
    fn test_list_first_failure_wins() {
        let codes = [ffi::SQLITE_OK, ffi::SQLITE_CONSTRAINT, ffi::SQLITE_CORRUPT];
        assert_eq!(ErrorKind::of_list(&codes, ffi::SQLITE_OK), ErrorKind::User);
        let all_ok = [ffi::SQLITE_OK, ffi::SQLITE_DONE];
        assert_eq!(
            ErrorKind::of_list(&all_ok, ffi::SQLITE_OK),
            ErrorKind::Success
        );
    }
}
