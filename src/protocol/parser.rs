//! Streaming operation parser
//!
//! Pulls YAML events off a socket one at a time and drives the reusable
//! [`MovieBuilder`], so a request is decoded without ever buffering the
//! whole document.
//!
//! ## State machine
//! The top level is either outside or inside the request mapping. Outside,
//! only the no-argument operations (`list_movies`, `list_summaries`) are
//! accepted as bare scalars. Inside, a scalar names the operation and a
//! sub-parser consumes its value: a full movie mapping for `add_movie`, a
//! compact scalar or small `{id, genre}` mapping for the keyed operations.
//!
//! ## Error recovery
//! A structural mismatch inside a sub-parser consumes events until the
//! enclosing mapping/sequence balance is restored, then surfaces a
//! `ParseError`; the session continues with the next operation. Two
//! terminals do not recover: end of stream (`ParseDone` forever after) and
//! an input failure (one `ParseError` carrying the cause, then
//! `ParseDone`).

use std::fmt::Write as _;
use std::io::Read;

use yaml_rust2::parser::Parser;
use yaml_rust2::scanner::Marker;
use yaml_rust2::{Event, ScanError};

use crate::movie::MovieBuilder;

use super::operation::Operation;
use super::source::{ErrorSlot, ReadChars};

/// Internal tag for an operation whose payload lives in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    AddMovie,
    AddGenre,
    RemoveMovie,
    ListSummaries,
    ListMovies,
    GetMovie,
    SearchByGenre,
}

impl OpKind {
    /// Recognize an operation key: symbolic name or decimal code.
    fn from_key(key: &str) -> Option<OpKind> {
        match key {
            "add_movie" | "1" => Some(OpKind::AddMovie),
            "add_genre" | "2" => Some(OpKind::AddGenre),
            "remove_movie" | "3" => Some(OpKind::RemoveMovie),
            "list_summaries" | "4" => Some(OpKind::ListSummaries),
            "list_movies" | "5" => Some(OpKind::ListMovies),
            "get_movie" | "6" => Some(OpKind::GetMovie),
            "search_by_genre" | "7" => Some(OpKind::SearchByGenre),
            _ => None,
        }
    }
}

/// Field keys recognized inside operation mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKey {
    Id,
    Title,
    Genre,
    /// `name` is a genre alias only in keyed operations.
    Name,
    Director,
    Year,
    Other,
}

impl FieldKey {
    fn from_key(key: &str) -> FieldKey {
        match key {
            "id" => FieldKey::Id,
            "title" => FieldKey::Title,
            "genre" | "genres" => FieldKey::Genre,
            "name" => FieldKey::Name,
            "director" => FieldKey::Director,
            "year" | "release_year" => FieldKey::Year,
            _ => FieldKey::Other,
        }
    }
}

/// Outcome of one parse step, before payloads are borrowed out.
enum Parsed {
    /// The builder holds a complete payload for this operation.
    Op(OpKind),
    /// The error buffer holds the message.
    Error,
    /// Stream exhausted.
    Done,
}

/// Event-driven parser for one client session.
pub struct OpParser<R: Read> {
    yaml: Parser<ReadChars<R>>,
    input_error: ErrorSlot,
    builder: MovieBuilder,
    /// Reusable error-message buffer; `ParseError` borrows from it.
    errbuf: String,
    /// Whether the top level is currently inside the request mapping.
    in_mapping: bool,
    done: bool,
}

impl<R: Read> OpParser<R> {
    /// Bind a parser to a byte stream for the duration of one session.
    pub fn new(reader: R) -> Self {
        let (source, input_error) = ReadChars::new(reader);
        OpParser {
            yaml: Parser::new(source),
            input_error,
            builder: MovieBuilder::new(),
            errbuf: String::new(),
            in_mapping: false,
            done: false,
        }
    }

    /// Whether the input stream is exhausted. Once true, `next_op` returns
    /// `ParseDone` forever.
    pub fn finished(&self) -> bool {
        self.done
    }

    /// Decode the next operation.
    ///
    /// Borrowed payloads are valid until this is called again.
    pub fn next_op(&mut self) -> Operation<'_> {
        let parsed = self.advance();
        self.materialize(parsed)
    }

    // =========================================================================
    // Top level
    // =========================================================================

    fn advance(&mut self) -> Parsed {
        while !self.done {
            let (event, marker) = match self.yaml.next_token() {
                Ok(token) => token,
                Err(err) => return self.scan_fail(&err),
            };
            match event {
                Event::Scalar(value, ..) => {
                    let Some(kind) = OpKind::from_key(&value) else {
                        return self.invalid(marker, "unrecognized operation key");
                    };
                    if self.in_mapping {
                        return match kind {
                            OpKind::AddMovie => self.parse_movie(kind),
                            OpKind::AddGenre => self.parse_movie_key(kind, true, true),
                            OpKind::GetMovie | OpKind::RemoveMovie => {
                                self.parse_movie_key(kind, true, false)
                            }
                            OpKind::SearchByGenre => self.parse_movie_key(kind, false, true),
                            OpKind::ListSummaries | OpKind::ListMovies => {
                                self.parse_movie_key(kind, false, false)
                            }
                        };
                    }
                    return match kind {
                        OpKind::ListSummaries | OpKind::ListMovies => Parsed::Op(kind),
                        _ => self.invalid(marker, "operation requires a dictionary"),
                    };
                }
                Event::MappingStart(..) => {
                    if self.in_mapping {
                        return self.invalid(
                            marker,
                            "another operation started without finishing the first one",
                        );
                    }
                    self.in_mapping = true;
                }
                Event::MappingEnd => {
                    if !self.in_mapping {
                        return self.invalid(marker, "finishing an unstarted operation");
                    }
                    self.in_mapping = false;
                }
                Event::StreamEnd => return self.parse_done(),
                // stream/document boundaries, aliases, and stray sequences
                // carry no operation content
                _ => {}
            }
        }
        self.parse_done()
    }

    fn materialize(&mut self, parsed: Parsed) -> Operation<'_> {
        match parsed {
            Parsed::Done => Operation::ParseDone,
            Parsed::Error => Operation::ParseError(&self.errbuf),
            Parsed::Op(kind) => match kind {
                OpKind::ListMovies => Operation::ListMovies,
                OpKind::ListSummaries => Operation::ListSummaries,
                OpKind::AddMovie => match self.builder.current_movie() {
                    Some(movie) => Operation::AddMovie(movie),
                    None => Operation::ParseError("operation incomplete"),
                },
                OpKind::AddGenre | OpKind::RemoveMovie | OpKind::GetMovie
                | OpKind::SearchByGenre => match self.builder.current_summary() {
                    // the summary title slot doubles as the key's genre
                    Some(key) => match kind {
                        OpKind::AddGenre => Operation::AddGenre {
                            movie_id: key.id,
                            genre: key.title,
                        },
                        OpKind::RemoveMovie => Operation::RemoveMovie { movie_id: key.id },
                        OpKind::GetMovie => Operation::GetMovie { movie_id: key.id },
                        _ => Operation::SearchByGenre { genre: key.title },
                    },
                    None => Operation::ParseError("operation incomplete"),
                },
            },
        }
    }

    // =========================================================================
    // Sub-parser: full movie mapping
    // =========================================================================

    fn parse_movie(&mut self, kind: OpKind) -> Parsed {
        self.builder.reset();
        // a registration never carries a real id; incoming `id` fields are
        // ignored below
        self.builder.set_id(0);

        let mut in_mapping = false;
        let mut pending: Option<FieldKey> = None;
        let mut had_error = false;

        while !self.done {
            let (event, marker) = match self.yaml.next_token() {
                Ok(token) => token,
                Err(err) => {
                    if self.movie_done() {
                        return Parsed::Op(kind);
                    }
                    return self.scan_fail(&err);
                }
            };
            match event {
                Event::Scalar(value, ..) => match pending.take() {
                    None => {
                        if in_mapping {
                            let key = FieldKey::from_key(&value);
                            if key == FieldKey::Genre {
                                if self.parse_genre_list() {
                                    had_error = true;
                                }
                            } else {
                                pending = Some(key);
                            }
                        } else {
                            self.invalid(marker, "invalid movie input, not inside a mapping");
                            had_error = true;
                        }
                    }
                    Some(FieldKey::Title) => {
                        if !self.builder.has_title() && self.builder.set_title(&value).is_err() {
                            self.invalid(marker, "out of memory for title input");
                            had_error = true;
                        }
                    }
                    Some(FieldKey::Director) => {
                        if !self.builder.has_director()
                            && self.builder.set_director(&value).is_err()
                        {
                            self.invalid(marker, "out of memory for director input");
                            had_error = true;
                        }
                    }
                    Some(FieldKey::Year) => {
                        if !self.builder.has_release_year() && !self.set_year(&value, marker) {
                            had_error = true;
                        }
                    }
                    // `id`, `name`, and unknown keys are ignored here
                    Some(_) => {}
                },
                Event::MappingStart(..) => {
                    if in_mapping {
                        self.invalid(marker, "nested mapping invalid here");
                        had_error = matches!(self.consume_balanced(false), Parsed::Error);
                    } else {
                        in_mapping = true;
                    }
                }
                Event::MappingEnd => {
                    if !in_mapping {
                        // this closed the enclosing request mapping
                        self.in_mapping = false;
                    }
                    return self.finish_movie(kind, marker, had_error, "operation incomplete");
                }
                Event::SequenceStart(..) => {
                    self.invalid(marker, "sequence unsupported in this operation");
                    had_error = matches!(self.consume_balanced(true), Parsed::Error);
                }
                Event::Nothing | Event::Alias(..) => {}
                Event::StreamEnd => {
                    let ended = self.parse_done();
                    if self.movie_done() {
                        return Parsed::Op(kind);
                    }
                    if matches!(ended, Parsed::Error) || had_error {
                        return Parsed::Error;
                    }
                    return self.invalid(marker, "document ended unexpectedly");
                }
                _ => {
                    return self.finish_movie(kind, marker, had_error, "document ended unexpectedly")
                }
            }
        }

        if self.movie_done() {
            Parsed::Op(kind)
        } else if had_error {
            Parsed::Error
        } else {
            self.static_error("document ended unexpectedly")
        }
    }

    fn movie_done(&self) -> bool {
        self.builder.has_id()
            && self.builder.has_title()
            && self.builder.has_director()
            && self.builder.has_release_year()
            && self.builder.has_genres()
    }

    fn finish_movie(
        &mut self,
        kind: OpKind,
        marker: Marker,
        had_error: bool,
        message: &str,
    ) -> Parsed {
        if self.movie_done() {
            Parsed::Op(kind)
        } else if had_error {
            Parsed::Error
        } else {
            self.invalid(marker, message)
        }
    }

    fn set_year(&mut self, value: &str, marker: Marker) -> bool {
        match value.parse::<i64>() {
            Ok(year) => match i32::try_from(year) {
                Ok(year) => {
                    self.builder.set_release_year(year);
                    true
                }
                Err(_) => {
                    self.invalid(marker, "release year out of range");
                    false
                }
            },
            Err(_) => {
                self.invalid(marker, "release year is not a valid integer");
                false
            }
        }
    }

    /// Consume a genre value: a sequence of scalars or one compact scalar.
    /// A duplicate `genres` key is consumed but ignored, first value wins.
    /// Returns whether an error was recorded.
    fn parse_genre_list(&mut self) -> bool {
        let ignore = self.builder.has_genres();
        if !ignore {
            self.builder.start_genres();
        }

        let mut in_list = false;
        let mut had_error = false;
        while !self.done {
            let (event, marker) = match self.yaml.next_token() {
                Ok(token) => token,
                Err(err) => {
                    self.scan_fail(&err);
                    return true;
                }
            };
            match event {
                Event::Scalar(value, ..) => {
                    if !ignore && self.builder.add_genre(&value).is_err() {
                        self.invalid(marker, "out of memory when adding a genre");
                        had_error = true;
                    }
                    if !in_list {
                        // compact form: `genres: Action`
                        return had_error;
                    }
                }
                Event::SequenceStart(..) => {
                    if in_list {
                        self.invalid(marker, "nested sequence in genre list invalid");
                        had_error = matches!(self.consume_balanced(true), Parsed::Error);
                    } else {
                        in_list = true;
                    }
                }
                Event::SequenceEnd => return had_error,
                Event::MappingStart(..) => {
                    self.invalid(marker, "mapping unsupported in genre list");
                    had_error = matches!(self.consume_balanced(false), Parsed::Error);
                }
                Event::Nothing | Event::Alias(..) => {}
                Event::StreamEnd => {
                    if matches!(self.parse_done(), Parsed::Error) {
                        return true;
                    }
                    if !had_error {
                        self.invalid(marker, "document ended unexpectedly");
                    }
                    return true;
                }
                _ => {
                    if !had_error {
                        self.invalid(marker, "document ended unexpectedly");
                    }
                    return true;
                }
            }
        }

        if !had_error {
            self.static_error("document ended unexpectedly");
        }
        true
    }

    // =========================================================================
    // Sub-parser: keyed operations (id and/or genre)
    // =========================================================================

    fn parse_movie_key(&mut self, kind: OpKind, needs_id: bool, needs_genre: bool) -> Parsed {
        self.builder.reset();
        if !needs_id {
            self.builder.set_id(0);
        }
        if !needs_genre && self.builder.set_title("").is_err() {
            return self.static_error("out of memory");
        }

        let mut in_mapping = false;
        let mut pending: Option<FieldKey> = None;
        let mut had_error = false;

        while !self.done {
            let (event, marker) = match self.yaml.next_token() {
                Ok(token) => token,
                Err(err) => {
                    if self.key_done() {
                        return Parsed::Op(kind);
                    }
                    return self.scan_fail(&err);
                }
            };
            match event {
                Event::Scalar(value, ..) => match pending.take() {
                    None => {
                        if in_mapping {
                            pending = Some(FieldKey::from_key(&value));
                        } else if !self.builder.has_id() && self.builder.has_title() {
                            // compact form carrying a bare id; the scalar
                            // completes the operation on its own
                            if self.set_key_id(&value, marker) {
                                return Parsed::Op(kind);
                            }
                            had_error = true;
                        } else if self.builder.has_id() && !self.builder.has_title() {
                            // compact form carrying a bare genre
                            if self.set_key_genre(&value, marker) {
                                return Parsed::Op(kind);
                            }
                            had_error = true;
                        } else {
                            self.invalid(marker, "invalid input for operation");
                            had_error = true;
                        }
                    }
                    Some(FieldKey::Id) => {
                        if !self.builder.has_id() && !self.set_key_id(&value, marker) {
                            had_error = true;
                        }
                    }
                    Some(FieldKey::Genre | FieldKey::Name) => {
                        if !self.builder.has_title() && !self.set_key_genre(&value, marker) {
                            had_error = true;
                        }
                    }
                    Some(_) => {}
                },
                Event::MappingStart(..) => {
                    if in_mapping {
                        self.invalid(marker, "nested mapping invalid here");
                        had_error = matches!(self.consume_balanced(false), Parsed::Error);
                    } else {
                        in_mapping = true;
                    }
                }
                Event::MappingEnd => {
                    if !in_mapping {
                        self.in_mapping = false;
                    }
                    return self.finish_key(kind, marker, had_error, "operation incomplete");
                }
                Event::SequenceStart(..) => {
                    self.invalid(marker, "sequence unsupported in this operation");
                    had_error = matches!(self.consume_balanced(true), Parsed::Error);
                }
                Event::Nothing | Event::Alias(..) => {}
                Event::StreamEnd => {
                    let ended = self.parse_done();
                    if self.key_done() {
                        return Parsed::Op(kind);
                    }
                    if matches!(ended, Parsed::Error) || had_error {
                        return Parsed::Error;
                    }
                    return self.invalid(marker, "document ended unexpectedly");
                }
                _ => {
                    return self.finish_key(kind, marker, had_error, "document ended unexpectedly")
                }
            }
        }

        if self.key_done() {
            Parsed::Op(kind)
        } else if had_error {
            Parsed::Error
        } else {
            self.static_error("document ended unexpectedly")
        }
    }

    fn key_done(&self) -> bool {
        self.builder.has_id() && self.builder.has_title()
    }

    fn finish_key(
        &mut self,
        kind: OpKind,
        marker: Marker,
        had_error: bool,
        message: &str,
    ) -> Parsed {
        if self.key_done() {
            Parsed::Op(kind)
        } else if had_error {
            Parsed::Error
        } else {
            self.invalid(marker, message)
        }
    }

    fn set_key_id(&mut self, value: &str, marker: Marker) -> bool {
        match value.parse::<i64>() {
            Ok(id) => {
                self.builder.set_id(id);
                true
            }
            Err(_) => {
                self.invalid(marker, "movie id is not a valid integer");
                false
            }
        }
    }

    fn set_key_genre(&mut self, value: &str, marker: Marker) -> bool {
        // stored in the summary title slot, read back at materialization
        match self.builder.set_title(value) {
            Ok(()) => true,
            Err(_) => {
                self.invalid(marker, "out of memory for genre input");
                false
            }
        }
    }

    // =========================================================================
    // Recovery and terminal states
    // =========================================================================

    /// Consume events until the structure opened before the failure closes
    /// again, so the next operation starts from a clean boundary. Returns
    /// `Parsed::Error` once balance is restored (the recorded error
    /// stands), or the terminal state that interrupted the recovery.
    fn consume_balanced(&mut self, is_sequence: bool) -> Parsed {
        let mut mappings: usize = usize::from(!is_sequence);
        let mut sequences: usize = usize::from(is_sequence);

        while !self.done {
            let (event, marker) = match self.yaml.next_token() {
                Ok(token) => token,
                Err(err) => return self.scan_fail(&err),
            };
            match event {
                Event::MappingStart(..) => mappings += 1,
                Event::MappingEnd => {
                    if mappings == 0 {
                        return self.invalid(marker, "unexpected end of mapping");
                    }
                    mappings -= 1;
                    if mappings == 0 && sequences == 0 {
                        return Parsed::Error;
                    }
                }
                Event::SequenceStart(..) => sequences += 1,
                Event::SequenceEnd => {
                    if sequences == 0 {
                        return self.invalid(marker, "unexpected end of sequence");
                    }
                    sequences -= 1;
                    if mappings == 0 && sequences == 0 {
                        return Parsed::Error;
                    }
                }
                Event::StreamEnd => return self.parse_done(),
                Event::Nothing | Event::Alias(..) | Event::Scalar(..) => {}
                // stream/document boundaries cannot appear inside the
                // structure being skipped
                _ => return self.invalid(marker, "unexpected end of document"),
            }
        }
        Parsed::Error
    }

    /// The stream ended. Reports a pending input error exactly once, then
    /// `Done` forever.
    fn parse_done(&mut self) -> Parsed {
        self.done = true;
        match self.input_error.take() {
            Some(cause) => {
                self.errbuf.clear();
                self.errbuf.push_str(&cause);
                Parsed::Error
            }
            None => Parsed::Done,
        }
    }

    /// The scanner failed; fatal for this parser.
    fn scan_fail(&mut self, err: &ScanError) -> Parsed {
        self.done = true;
        self.errbuf.clear();
        match self.input_error.take() {
            Some(cause) => self.errbuf.push_str(&cause),
            None => {
                let _ = write!(self.errbuf, "{err}");
            }
        }
        Parsed::Error
    }

    /// Record a recoverable error with its stream position.
    fn invalid(&mut self, marker: Marker, message: &str) -> Parsed {
        self.errbuf.clear();
        let _ = write!(self.errbuf, "{message} at {}:{}", marker.line(), marker.col());
        Parsed::Error
    }

    fn static_error(&mut self, message: &str) -> Parsed {
        self.errbuf.clear();
        self.errbuf.push_str(message);
        Parsed::Error
    }
}
