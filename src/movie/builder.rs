//! Reusable movie builder
//!
//! Amortizes per-record allocation while assembling one movie (or summary)
//! at a time, plus an optional list of completed records.
//!
//! ## Memory layout
//! All strings live in a single arena that grows in fixed-size pages and is
//! reused across records: `reset` rewinds the watermark instead of freeing.
//! Records are descriptors of `(offset, len)` spans into the arena, so a
//! full listing of N movies performs a handful of arena growths at most,
//! not N string allocations.
//!
//! ## Failure semantics
//! Every mutation that may grow the arena or the list reserves memory
//! through `try_reserve` and reports failure as [`BuilderError`], leaving
//! the builder usable after the next `reset`.

use std::collections::TryReserveError;

use thiserror::Error;

use super::{Movie, MovieRef, MovieSummary, SummaryRef};

/// Step size for arena growth.
const ARENA_PAGE: usize = 4096;

/// Allocation failure while assembling a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuilderError {
    /// The allocator refused the requested growth.
    #[error("out of memory")]
    OutOfMemory,

    /// The requested size overflowed the address space.
    #[error("record too large")]
    TooLarge,
}

impl From<TryReserveError> for BuilderError {
    fn from(_: TryReserveError) -> Self {
        BuilderError::OutOfMemory
    }
}

/// A string slice recorded as a range of the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Span {
    offset: usize,
    len: usize,
}

/// Descriptor of one in-arena record.
///
/// Genres are a contiguous run of the builder's span table, so a record in
/// the list stays valid while later records append their own genres.
#[derive(Debug, Clone, Copy, Default)]
struct RecordRef {
    id: i64,
    title: Span,
    director: Span,
    release_year: i32,
    genres_start: usize,
    genres_len: usize,
}

/// Reusable builder for movies and summaries.
///
/// One per store connection; the data-access layer resets it at the start of
/// every streaming read and refills it row by row. Views handed out by
/// `current_movie`/`current_summary` borrow the arena and are invalidated by
/// the next mutation.
#[derive(Debug, Default)]
pub struct MovieBuilder {
    /// String arena, grown in `ARENA_PAGE` steps, rewound by `reset`.
    arena: String,

    /// Span table for all genres recorded since the last `reset`.
    genre_spans: Vec<Span>,

    /// The record currently being assembled.
    current: RecordRef,

    has_id: bool,
    has_title: bool,
    has_director: bool,
    has_release_year: bool,
    has_genres: bool,

    /// Completed records awaiting `take_movie_list`/`take_summary_list`.
    list: Vec<RecordRef>,
}

impl MovieBuilder {
    /// Create an empty builder. The arena is allocated lazily on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind the arena and forget the current record and the list.
    ///
    /// Capacity is retained. Any previously returned view is invalidated
    /// (the borrow checker enforces this at compile time).
    pub fn reset(&mut self) {
        self.arena.truncate(0);
        self.genre_spans.clear();
        self.list.clear();
        self.current = RecordRef::default();
        self.has_id = false;
        self.has_title = false;
        self.has_director = false;
        self.has_release_year = false;
        self.has_genres = false;
    }

    pub fn has_id(&self) -> bool {
        self.has_id
    }

    pub fn has_title(&self) -> bool {
        self.has_title
    }

    pub fn has_director(&self) -> bool {
        self.has_director
    }

    pub fn has_release_year(&self) -> bool {
        self.has_release_year
    }

    pub fn has_genres(&self) -> bool {
        self.has_genres
    }

    /// Set the id of the current record. At most once per record.
    pub fn set_id(&mut self, id: i64) {
        debug_assert!(!self.has_id);
        self.current.id = id;
        self.has_id = true;
    }

    /// Set the release year of the current record. At most once per record.
    pub fn set_release_year(&mut self, year: i32) {
        debug_assert!(!self.has_release_year);
        self.current.release_year = year;
        self.has_release_year = true;
    }

    /// Copy `title` into the arena. At most once per record.
    pub fn set_title(&mut self, title: &str) -> Result<(), BuilderError> {
        debug_assert!(!self.has_title);
        self.current.title = self.append(title)?;
        self.has_title = true;
        Ok(())
    }

    /// Copy `director` into the arena. At most once per record.
    pub fn set_director(&mut self, director: &str) -> Result<(), BuilderError> {
        debug_assert!(!self.has_director);
        self.current.director = self.append(director)?;
        self.has_director = true;
        Ok(())
    }

    /// Mark the start of the current record's genre run.
    ///
    /// Must precede any `add_genre` for this record. At most once per record.
    pub fn start_genres(&mut self) {
        debug_assert!(!self.has_genres);
        self.current.genres_start = self.genre_spans.len();
        self.current.genres_len = 0;
        self.has_genres = true;
    }

    /// Append one genre to the current record's run.
    pub fn add_genre(&mut self, genre: &str) -> Result<(), BuilderError> {
        debug_assert!(self.has_genres);
        let span = self.append(genre)?;
        self.genre_spans.try_reserve(1)?;
        self.genre_spans.push(span);
        self.current.genres_len += 1;
        Ok(())
    }

    /// View the current record as a movie.
    ///
    /// `None` unless all five fields have been set since the last record
    /// boundary.
    pub fn current_movie(&self) -> Option<MovieRef<'_>> {
        if self.has_id
            && self.has_title
            && self.has_director
            && self.has_release_year
            && self.has_genres
        {
            Some(self.movie_at(&self.current))
        } else {
            None
        }
    }

    /// View the current record as a summary. Requires id and title.
    pub fn current_summary(&self) -> Option<SummaryRef<'_>> {
        if self.has_id && self.has_title {
            Some(SummaryRef {
                id: self.current.id,
                title: self.get(self.current.title),
            })
        } else {
            None
        }
    }

    /// Move the current record into the list and start a new one.
    ///
    /// Requires a complete movie; the arena is kept so the listed record
    /// stays addressable.
    pub fn add_current_to_movie_list(&mut self) -> Result<(), BuilderError> {
        debug_assert!(self.current_movie().is_some());
        self.list.try_reserve(1)?;
        self.list.push(self.current);
        self.clear_flags();
        Ok(())
    }

    /// Move the current record into the list as a summary.
    ///
    /// Requires id and title only.
    pub fn add_current_to_summary_list(&mut self) -> Result<(), BuilderError> {
        debug_assert!(self.has_id && self.has_title);
        self.list.try_reserve(1)?;
        self.list.push(RecordRef {
            id: self.current.id,
            title: self.current.title,
            ..RecordRef::default()
        });
        self.clear_flags();
        Ok(())
    }

    /// Number of records accumulated in the list.
    pub fn list_len(&self) -> usize {
        self.list.len()
    }

    /// Materialize the list as owned movies, copying out of the arena.
    pub fn take_movie_list(&self) -> Vec<Movie> {
        self.list.iter().map(|r| self.movie_at(r).to_owned()).collect()
    }

    /// Materialize the list as owned summaries.
    pub fn take_summary_list(&self) -> Vec<MovieSummary> {
        self.list
            .iter()
            .map(|r| MovieSummary {
                id: r.id,
                title: self.get(r.title).to_owned(),
            })
            .collect()
    }

    fn clear_flags(&mut self) {
        self.has_id = false;
        self.has_title = false;
        self.has_director = false;
        self.has_release_year = false;
        self.has_genres = false;
    }

    fn movie_at(&self, record: &RecordRef) -> MovieRef<'_> {
        let genres = self.genre_spans[record.genres_start..record.genres_start + record.genres_len]
            .iter()
            .map(|span| self.get(*span))
            .collect();
        MovieRef {
            id: record.id,
            title: self.get(record.title),
            director: self.get(record.director),
            release_year: record.release_year,
            genres,
        }
    }

    fn get(&self, span: Span) -> &str {
        &self.arena[span.offset..span.offset + span.len]
    }

    /// Copy `text` into the arena, growing it in whole pages.
    ///
    /// On failure the arena is unchanged and the builder remains usable.
    fn append(&mut self, text: &str) -> Result<Span, BuilderError> {
        let offset = self.arena.len();
        let needed = offset.checked_add(text.len()).ok_or(BuilderError::TooLarge)?;
        if needed > self.arena.capacity() {
            let target = needed
                .checked_next_multiple_of(ARENA_PAGE)
                .ok_or(BuilderError::TooLarge)?;
            self.arena.try_reserve_exact(target - offset)?;
        }
        self.arena.push_str(text);
        Ok(Span {
            offset,
            len: text.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_grows_in_pages() {
        let mut builder = MovieBuilder::new();
        builder.set_title("x").unwrap();
        assert!(builder.arena.capacity() >= ARENA_PAGE);

        builder.reset();
        builder.set_title(&"y".repeat(ARENA_PAGE + 1)).unwrap();
        assert!(builder.arena.capacity() >= 2 * ARENA_PAGE);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut builder = MovieBuilder::new();
        builder.set_title("a long enough title").unwrap();
        let cap = builder.arena.capacity();

        builder.reset();
        assert!(!builder.has_title());
        assert_eq!(builder.arena.len(), 0);
        assert_eq!(builder.arena.capacity(), cap);
    }
}
