//! Response framing
//!
//! Human-readable replies with embedded YAML documents for list responses.
//! Every response unit ends with a blank line; list documents are framed by
//! `---` / `...`.

use std::io::{self, Write};

use crate::movie::{MovieRef, SummaryRef};

/// Document key for a full listing.
pub const MOVIES_KEY: &str = "movies";

/// Document key for a genre-filtered search.
pub const SELECTED_MOVIES_KEY: &str = "selected_movies";

/// Document key for the summary listing.
pub const SUMMARIES_KEY: &str = "summaries";

/// `server: ok` — success with no payload.
pub fn write_ok(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(b"server: ok\n\n")
}

/// `server: <message>` — a failure the session survives.
pub fn write_server_error(writer: &mut impl Write, message: &str) -> io::Result<()> {
    write!(writer, "server: {message}\n\n")
}

/// `server: parsing error: <message>` — one operation was undecodable.
pub fn write_parse_error(writer: &mut impl Write, message: &str) -> io::Result<()> {
    write!(writer, "server: parsing error: {message}\n\n")
}

/// A single movie record, either standalone (under a `movie:` header) or as
/// one item of a list document.
pub fn write_movie(writer: &mut impl Write, movie: &MovieRef<'_>, in_list: bool) -> io::Result<()> {
    let first = if in_list {
        "  - "
    } else {
        writer.write_all(b"movie:\n")?;
        "    "
    };

    writeln!(writer, "{first}id: {}", movie.id)?;
    writeln!(writer, "    title: {}", movie.title)?;
    writeln!(writer, "    release_year: {}", movie.release_year)?;
    writeln!(writer, "    director: {}", movie.director)?;
    if movie.genres.is_empty() {
        writeln!(writer, "    genres: []")?;
    } else {
        writeln!(writer, "    genres:")?;
        for genre in &movie.genres {
            writeln!(writer, "      - {genre}")?;
        }
    }
    writer.write_all(b"\n")
}

/// One summary item of a list document, inline form.
pub fn write_summary(writer: &mut impl Write, summary: &SummaryRef<'_>) -> io::Result<()> {
    writeln!(
        writer,
        "  - {{ id: {}, title: '{}' }}",
        summary.id, summary.title
    )
}

/// Open a list document. Movie lists put a blank line after the key,
/// summary lists do not.
pub fn write_list_header(writer: &mut impl Write, key: &str, spaced: bool) -> io::Result<()> {
    if spaced {
        write!(writer, "---\n{key}:\n\n")
    } else {
        write!(writer, "---\n{key}:\n")
    }
}

/// Close a list document.
pub fn write_list_footer(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(b"...\n")
}
