//! Movie Records Module
//!
//! Record types for the store and the reusable builder that assembles them.
//!
//! ## Two shapes per record
//! - Owned records (`Movie`, `MovieSummary`) hold their own strings and can
//!   outlive everything.
//! - Borrowed views (`MovieRef`, `SummaryRef`) point into a
//!   [`MovieBuilder`]'s arena and are only valid until the builder is next
//!   mutated. Streaming readers hand these to visitors so a full listing
//!   never allocates per row.

mod builder;

pub use builder::{BuilderError, MovieBuilder};

/// A full movie record with an owned genre list.
///
/// `id == 0` means "not yet assigned"; the data-access layer fills in the
/// real id when the movie is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    /// Unique identifier in the store (0 before registration).
    pub id: i64,

    /// Movie title (non-empty UTF-8).
    pub title: String,

    /// Director name (non-empty UTF-8).
    pub director: String,

    /// Year the movie was released.
    pub release_year: i32,

    /// Genres in insertion order.
    pub genres: Vec<String>,
}

impl Movie {
    /// Borrow this record in the view form used by visitors and framing.
    pub fn as_view(&self) -> MovieRef<'_> {
        MovieRef {
            id: self.id,
            title: &self.title,
            director: &self.director,
            release_year: self.release_year,
            genres: self.genres.iter().map(String::as_str).collect(),
        }
    }
}

/// Cheap projection of a movie to `(id, title)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieSummary {
    /// Unique identifier in the store.
    pub id: i64,

    /// Movie title.
    pub title: String,
}

/// A movie view borrowing its strings from a [`MovieBuilder`] arena.
///
/// Valid until the next mutation of the builder it was taken from. Callers
/// that need the data past that window must copy it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRef<'a> {
    /// Unique identifier in the store (0 before registration).
    pub id: i64,

    /// Borrowed title.
    pub title: &'a str,

    /// Borrowed director name.
    pub director: &'a str,

    /// Year the movie was released.
    pub release_year: i32,

    /// Borrowed genres in insertion order.
    pub genres: Vec<&'a str>,
}

impl MovieRef<'_> {
    /// Copy this view into an owned [`Movie`].
    pub fn to_owned(&self) -> Movie {
        Movie {
            id: self.id,
            title: self.title.to_owned(),
            director: self.director.to_owned(),
            release_year: self.release_year,
            genres: self.genres.iter().map(|g| (*g).to_owned()).collect(),
        }
    }
}

/// A summary view borrowing its title from a [`MovieBuilder`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryRef<'a> {
    /// Unique identifier in the store.
    pub id: i64,

    /// Borrowed title.
    pub title: &'a str,
}

impl SummaryRef<'_> {
    /// Copy this view into an owned [`MovieSummary`].
    pub fn to_owned(&self) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title.to_owned(),
        }
    }
}
