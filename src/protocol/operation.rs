//! Parsed client operations
//!
//! One value per request read off the wire. String payloads borrow from the
//! parser that produced them and are invalidated by the next
//! [`next_op`](super::OpParser::next_op) call; dispatchers that keep data
//! past that point copy it out.

use crate::movie::MovieRef;

/// One operation decoded from the client stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Register a new movie. `movie.id` is always 0 here.
    AddMovie(MovieRef<'a>),

    /// Link a genre to an existing movie.
    AddGenre { movie_id: i64, genre: &'a str },

    /// Delete a movie and its genre links.
    RemoveMovie { movie_id: i64 },

    /// Fetch a single movie with its genres.
    GetMovie { movie_id: i64 },

    /// Stream every movie.
    ListMovies,

    /// Stream every movie carrying a genre.
    SearchByGenre { genre: &'a str },

    /// Stream the `(id, title)` projection of every movie.
    ListSummaries,

    /// This operation could not be decoded; the stream itself survives
    /// unless it is already dead.
    ParseError(&'a str),

    /// The input stream is exhausted; terminal.
    ParseDone,
}
