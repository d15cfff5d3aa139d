//! Store connection
//!
//! Wraps one SQLite connection with the statement catalog, transaction
//! discipline, and the streaming read protocol.
//!
//! ## Ownership
//! A [`Db`] is used by exactly one thread at a time; each worker opens its
//! own on startup and closes it on exit. The connection owns the reusable
//! [`MovieBuilder`] that backs every streaming read.
//!
//! ## Transactions
//! Every multi-statement mutation runs under `BEGIN DEFERRED`; reads run
//! under a deferred transaction as well so the row set handed to a visitor
//! is stable. On failure the transaction is rolled back explicitly, and a
//! rollback that itself fails is escalated to a hard error.
//!
//! ## Streaming reads
//! Row visitors receive borrowed views into the connection's builder, valid
//! only for the duration of the call; they return `true` to stop the
//! iteration. Visitors that keep data must copy it out.

use std::os::raw::c_int;
use std::path::Path;

use rusqlite::{ffi, params, Connection, OpenFlags, Row, ToSql, Transaction, TransactionBehavior};

use crate::movie::{Movie, MovieBuilder, MovieRef, SummaryRef};

use super::error::{DbError, DbResult, UNKNOWN_ERROR};
use super::schema::SCHEMA;

// =============================================================================
// Statement catalog
// =============================================================================

const INSERT_MOVIE: &str = "\
INSERT INTO movie(title, director, release_year)
    VALUES (?1, ?2, ?3)
    RETURNING movie.id;";

const INSERT_GENRE: &str = "\
INSERT OR IGNORE INTO genre(name)
    VALUES (?1);";

const LINK_MOVIE_GENRE: &str = "\
INSERT INTO movie_genre(movie_id, genre_id)
    SELECT ?1, genre.id
        FROM genre
        WHERE genre.name = ?2;";

const DELETE_MOVIE: &str = "\
DELETE FROM movie
    WHERE id = ?1;";

const DELETE_UNUSED_GENRES: &str = "\
DELETE FROM genre
    WHERE id NOT IN (
        SELECT DISTINCT genre_id
            FROM movie_genre
    );";

const SELECT_ALL_TITLES: &str = "\
SELECT id, title
    FROM movie;";

const SELECT_ALL_MOVIES: &str = "\
SELECT id, title, director, release_year
    FROM movie;";

const SELECT_MOVIE_BY_ID: &str = "\
SELECT id, title, director, release_year
    FROM movie
    WHERE id = ?1;";

const SELECT_MOVIES_BY_GENRE: &str = "\
SELECT movie.id, movie.title, movie.director, movie.release_year
    FROM movie_genre
        INNER JOIN movie ON movie.id = movie_genre.movie_id
        INNER JOIN genre ON genre.id = movie_genre.genre_id
    WHERE genre.name = ?1;";

const SELECT_GENRES_OF_MOVIE: &str = "\
SELECT genre.name
    FROM genre
        INNER JOIN movie_genre ON genre.id = genre_id
    WHERE movie_id = ?1;";

/// Every statement the connection will ever run, prepared up front.
const STATEMENT_CATALOG: [&str; 9] = [
    INSERT_MOVIE,
    INSERT_GENRE,
    LINK_MOVIE_GENRE,
    DELETE_MOVIE,
    DELETE_UNUSED_GENRES,
    SELECT_ALL_TITLES,
    SELECT_ALL_MOVIES,
    SELECT_MOVIE_BY_ID,
    SELECT_MOVIES_BY_GENRE,
];

// =============================================================================
// Setup
// =============================================================================

/// Create the store file if absent and apply the schema, then close.
pub fn setup(path: impl AsRef<Path>) -> DbResult<()> {
    let conn = open(path.as_ref(), true)?;
    conn.execute_batch(SCHEMA)?;
    close(conn)
}

fn open(path: &Path, create: bool) -> DbResult<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_PRIVATE_CACHE;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    Ok(Connection::open_with_flags(path, flags)?)
}

fn close(conn: Connection) -> DbResult<()> {
    conn.close().map_err(|(conn, err)| {
        // a second close attempt happens when the handle drops; the first
        // error is the one worth reporting
        drop(conn);
        DbError::from(err)
    })
}

// =============================================================================
// Connection
// =============================================================================

/// One thread's handle to the store.
pub struct Db {
    conn: Connection,
    builder: MovieBuilder,
}

impl Db {
    /// Open an existing store and prepare the full statement catalog.
    ///
    /// Fails if the file is missing ([`setup`] must have run) or if any
    /// statement fails to prepare against the schema.
    pub fn connect(path: impl AsRef<Path>) -> DbResult<Self> {
        let conn = open(path.as_ref(), false)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // several workers share the store file; short transactions plus a
        // busy timeout keep cross-connection contention transient
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.set_prepared_statement_cache_capacity(2 * STATEMENT_CATALOG.len());
        for sql in STATEMENT_CATALOG {
            // warms the cache; dropping the handle keeps the statement alive
            conn.prepare_cached(sql)?;
        }
        Ok(Db {
            conn,
            builder: MovieBuilder::new(),
        })
    }

    /// Finalize all statements and close the connection.
    ///
    /// The connection is gone regardless of the returned result.
    pub fn close(self) -> DbResult<()> {
        close(self.conn)
    }

    /// Register a new movie and return its assigned id.
    ///
    /// One transaction covers the genre inserts, the movie insert, and the
    /// genre links; the engine must return exactly one generated id.
    pub fn register_movie(&mut self, movie: &MovieRef<'_>) -> DbResult<i64> {
        debug_assert_eq!(movie.id, 0);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        match register_in_tx(&tx, movie) {
            Ok(id) => {
                tx.commit()?;
                Ok(id)
            }
            Err(err) => rolled_back(tx, err),
        }
    }

    /// Link one genre to an existing movie, creating the genre if absent.
    pub fn add_genre(&mut self, movie_id: i64, genre: &str) -> DbResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        match add_genre_in_tx(&tx, movie_id, genre) {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(cause) => {
                let err = match extended_code(&cause) {
                    Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => DbError::user(format!(
                        "no movie with id = {movie_id} found in the database"
                    )),
                    Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => DbError::user(format!(
                        "movie with id = {movie_id} already has the provided genre"
                    )),
                    _ => DbError::from(cause),
                };
                rolled_back(tx, err)
            }
        }
    }

    /// Remove a movie; links cascade away and orphaned genres are collected.
    pub fn delete_movie(&mut self, movie_id: i64) -> DbResult<()> {
        // single statement, the engine's automatic transaction is enough
        let deleted = {
            let mut stmt = self.conn.prepare_cached(DELETE_MOVIE)?;
            stmt.execute(params![movie_id])?
        };
        if deleted < 1 {
            return Err(DbError::user(format!(
                "no movie with id = {movie_id} to be deleted from the database"
            )));
        }

        // best-effort: an orphaned genre must never fail the delete the
        // client asked for
        let collected = self
            .conn
            .prepare_cached(DELETE_UNUSED_GENRES)
            .and_then(|mut stmt| stmt.execute([]));
        if let Err(err) = collected {
            tracing::warn!(error = %err, "orphan genre cleanup failed");
        }
        Ok(())
    }

    /// Read a single movie, including its genres.
    pub fn get_movie(&mut self, movie_id: i64) -> DbResult<Movie> {
        let Db { conn, builder } = self;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let mut found = None;
        let result = stream_movies(&tx, builder, SELECT_MOVIE_BY_ID, &[&movie_id], &mut |movie| {
            found = Some(movie.to_owned());
            true
        });
        match result {
            Ok(_) => match found {
                Some(movie) => {
                    tx.commit()?;
                    Ok(movie)
                }
                None => rolled_back(
                    tx,
                    DbError::user(format!(
                        "no movie with id = {movie_id} found in the database"
                    )),
                ),
            },
            Err(err) => rolled_back(tx, err),
        }
    }

    /// Visit every movie. The view passed to `sink` is invalidated when the
    /// sink returns; `sink` returns `true` to stop early.
    pub fn list_movies(&mut self, mut sink: impl FnMut(&MovieRef<'_>) -> bool) -> DbResult<()> {
        let Db { conn, builder } = self;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        match stream_movies(&tx, builder, SELECT_ALL_MOVIES, &[], &mut sink) {
            Ok(_) => {
                tx.commit()?;
                Ok(())
            }
            Err(err) => rolled_back(tx, err),
        }
    }

    /// Visit every movie carrying the given genre. Same visitor contract as
    /// [`list_movies`](Db::list_movies).
    pub fn search_movies_by_genre(
        &mut self,
        genre: &str,
        mut sink: impl FnMut(&MovieRef<'_>) -> bool,
    ) -> DbResult<()> {
        let Db { conn, builder } = self;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        match stream_movies(&tx, builder, SELECT_MOVIES_BY_GENRE, &[&genre], &mut sink) {
            Ok(_) => {
                tx.commit()?;
                Ok(())
            }
            Err(err) => rolled_back(tx, err),
        }
    }

    /// Visit the `(id, title)` projection of every movie.
    pub fn list_summaries(
        &mut self,
        mut sink: impl FnMut(&SummaryRef<'_>) -> bool,
    ) -> DbResult<()> {
        let Db { conn, builder } = self;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        match stream_summaries(&tx, builder, &mut sink) {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(err) => rolled_back(tx, err),
        }
    }

    /// Rebuild every index. Maintenance entry point, not on any hot path.
    pub fn reindex(&mut self) -> DbResult<()> {
        self.conn.execute_batch("REINDEX;")?;
        Ok(())
    }
}

// =============================================================================
// Internals
// =============================================================================

fn register_in_tx(tx: &Transaction<'_>, movie: &MovieRef<'_>) -> DbResult<i64> {
    {
        let mut insert_genre = tx.prepare_cached(INSERT_GENRE)?;
        for genre in &movie.genres {
            insert_genre.execute(params![genre])?;
        }
    }

    let id = {
        let mut insert_movie = tx.prepare_cached(INSERT_MOVIE)?;
        let mut rows =
            insert_movie.query(params![movie.title, movie.director, movie.release_year])?;
        let row = rows
            .next()?
            .ok_or_else(|| DbError::hard("no id generated for inserted movie"))?;
        let id: i64 = row.get(0)?;
        if rows.next()?.is_some() {
            return Err(DbError::hard("multiple ids generated for inserted movie"));
        }
        id
    };

    let mut link = tx.prepare_cached(LINK_MOVIE_GENRE)?;
    for genre in &movie.genres {
        link.execute(params![id, genre])?;
    }
    Ok(id)
}

fn add_genre_in_tx(tx: &Transaction<'_>, movie_id: i64, genre: &str) -> rusqlite::Result<()> {
    tx.prepare_cached(INSERT_GENRE)?.execute(params![genre])?;
    tx.prepare_cached(LINK_MOVIE_GENRE)?
        .execute(params![movie_id, genre])?;
    Ok(())
}

/// Drive `sql` row by row, filling `builder` once per row and handing the
/// borrowed view to `sink`. Returns the number of rows visited.
fn stream_movies(
    tx: &Transaction<'_>,
    builder: &mut MovieBuilder,
    sql: &str,
    filter: &[&dyn ToSql],
    sink: &mut dyn FnMut(&MovieRef<'_>) -> bool,
) -> DbResult<usize> {
    builder.reset();
    let mut outer = tx.prepare_cached(sql)?;
    let mut genres = tx.prepare_cached(SELECT_GENRES_OF_MOVIE)?;

    let mut visited = 0;
    let mut rows = outer.query(filter)?;
    while let Some(row) = rows.next()? {
        builder.reset();
        let id: i64 = row.get(0)?;
        builder.set_id(id);
        builder.set_title(text_column(row, 1)?)?;
        builder.set_director(text_column(row, 2)?)?;
        builder.set_release_year(row.get(3)?);

        builder.start_genres();
        let mut genre_rows = genres.query(params![id])?;
        while let Some(genre_row) = genre_rows.next()? {
            builder.add_genre(text_column(genre_row, 0)?)?;
        }

        visited += 1;
        let movie = builder
            .current_movie()
            .ok_or_else(|| DbError::hard(UNKNOWN_ERROR))?;
        if sink(&movie) {
            break;
        }
    }
    Ok(visited)
}

fn stream_summaries(
    tx: &Transaction<'_>,
    builder: &mut MovieBuilder,
    sink: &mut dyn FnMut(&SummaryRef<'_>) -> bool,
) -> DbResult<()> {
    builder.reset();
    let mut stmt = tx.prepare_cached(SELECT_ALL_TITLES)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        builder.reset();
        builder.set_id(row.get(0)?);
        builder.set_title(text_column(row, 1)?)?;
        let summary = builder
            .current_summary()
            .ok_or_else(|| DbError::hard(UNKNOWN_ERROR))?;
        if sink(&summary) {
            break;
        }
    }
    Ok(())
}

fn text_column<'a>(row: &'a Row<'_>, idx: usize) -> DbResult<&'a str> {
    Ok(row.get_ref(idx)?.as_str()?)
}

/// Roll the transaction back and report `err`, unless the rollback itself
/// fails, which is unrecoverable for this connection.
fn rolled_back<T>(tx: Transaction<'_>, err: DbError) -> DbResult<T> {
    match tx.rollback() {
        Ok(()) => Err(err),
        Err(rollback_err) => Err(DbError::hard(format!("rollback failed: {rollback_err}"))),
    }
}

fn extended_code(err: &rusqlite::Error) -> Option<c_int> {
    match err {
        rusqlite::Error::SqliteFailure(cause, _) => Some(cause.extended_code),
        _ => None,
    }
}
