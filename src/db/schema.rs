//! Store schema
//!
//! Three tables: movies, genres, and the many-to-many link. Genres are
//! name-addressed and garbage-collected when no movie references them; the
//! link table cascades away with either parent.

/// Applied once by [`setup`](super::setup); every statement is idempotent.
pub const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS movie(
    id INTEGER PRIMARY KEY ASC AUTOINCREMENT NOT NULL,
    title TEXT NOT NULL,
    director TEXT NOT NULL,
    release_year INTEGER NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS genre(
    id INTEGER PRIMARY KEY ASC AUTOINCREMENT NOT NULL,
    name TEXT UNIQUE NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS movie_genre(
    movie_id INTEGER NOT NULL,
    genre_id INTEGER NOT NULL,
    FOREIGN KEY (movie_id)
        REFERENCES movie(id)
        ON DELETE CASCADE,
    FOREIGN KEY (genre_id)
        REFERENCES genre(id)
        ON DELETE CASCADE,
    UNIQUE (movie_id, genre_id)
) STRICT;

CREATE UNIQUE INDEX IF NOT EXISTS genre_name ON genre(name);
CREATE INDEX IF NOT EXISTS movie_id_link ON movie_genre(movie_id);
CREATE INDEX IF NOT EXISTS genre_id_link ON movie_genre(genre_id);
";
