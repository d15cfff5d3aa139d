//! Request handler
//!
//! Drives one client session: decode operations off the socket, dispatch to
//! the data-access layer, and stream the framed response back.
//!
//! ## Failure tracking
//! User and transient errors are reported to the client and the session
//! continues. A hard data-access error ends the session and is returned to
//! the worker so it can exit. A write failure on the socket (client gone)
//! silently ends the session.

use std::io::Write;
use std::net::TcpStream;

use crate::db::{Db, DbError};
use crate::protocol::{
    write_list_footer, write_list_header, write_movie, write_ok, write_parse_error,
    write_server_error, write_summary, OpParser, Operation, MOVIES_KEY, SELECTED_MOVIES_KEY,
    SUMMARIES_KEY,
};

/// Serve one client until its stream ends. Returns true on a hard failure,
/// telling the worker to abort.
pub fn handle_request(worker_id: usize, stream: &TcpStream, db: &mut Db) -> bool {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "<unknown>".to_owned(), |addr| addr.to_string());
    tracing::debug!(worker_id, peer = %peer, "session opened");

    // the parser reads from a shared borrow of the stream while responses
    // are written through another; both sides are used strictly in turn
    let mut parser = OpParser::new(stream);
    let mut writer = stream;

    let mut hard_fail = false;
    let mut client_gone = false;
    while !parser.finished() && !hard_fail && !client_gone {
        let mut result: Result<(), DbError> = Ok(());
        match parser.next_op() {
            Operation::ParseDone => {}
            Operation::ParseError(message) => {
                tracing::debug!(worker_id, message, "parse error");
                client_gone = write_parse_error(&mut writer, message).is_err();
            }
            Operation::AddMovie(movie) => {
                let ack = format!(
                    "server: received ADD_MOVIE: {} ({}), by {}\n",
                    movie.title, movie.release_year, movie.director
                );
                client_gone = writer.write_all(ack.as_bytes()).is_err();
                result = db.register_movie(&movie).map(|_| ());
                if result.is_ok() && !client_gone {
                    client_gone = write_ok(&mut writer).is_err();
                }
            }
            Operation::AddGenre { movie_id, genre } => {
                let ack = format!("server: received ADD_GENRE: {genre} TO id[{movie_id}]\n");
                client_gone = writer.write_all(ack.as_bytes()).is_err();
                result = db.add_genre(movie_id, genre);
                if result.is_ok() && !client_gone {
                    client_gone = write_ok(&mut writer).is_err();
                }
            }
            Operation::RemoveMovie { movie_id } => {
                let ack = format!("server: received REMOVE_MOVIE: id[{movie_id}]\n");
                client_gone = writer.write_all(ack.as_bytes()).is_err();
                result = db.delete_movie(movie_id);
                if result.is_ok() && !client_gone {
                    client_gone = write_ok(&mut writer).is_err();
                }
            }
            Operation::GetMovie { movie_id } => {
                let ack = format!("server: received GET_MOVIE: id[{movie_id}]\n");
                client_gone = writer.write_all(ack.as_bytes()).is_err();
                match db.get_movie(movie_id) {
                    Ok(movie) => {
                        client_gone |=
                            write_movie(&mut writer, &movie.as_view(), false).is_err();
                    }
                    Err(err) => result = Err(err),
                }
            }
            Operation::ListMovies => {
                client_gone = writer.write_all(b"server: received LIST_MOVIES\n").is_err()
                    || write_list_header(&mut writer, MOVIES_KEY, true).is_err();
                if !client_gone {
                    let mut write_failed = false;
                    result = db.list_movies(|movie| {
                        write_failed = write_movie(&mut writer, movie, true).is_err();
                        write_failed
                    });
                    client_gone = write_failed;
                    if result.is_ok() && !client_gone {
                        client_gone = write_list_footer(&mut writer).is_err();
                    }
                }
            }
            Operation::SearchByGenre { genre } => {
                let ack = format!("server: received SEARCH_BY_GENRE: {genre}\n");
                client_gone = writer.write_all(ack.as_bytes()).is_err()
                    || write_list_header(&mut writer, SELECTED_MOVIES_KEY, true).is_err();
                if !client_gone {
                    let mut write_failed = false;
                    result = db.search_movies_by_genre(genre, |movie| {
                        write_failed = write_movie(&mut writer, movie, true).is_err();
                        write_failed
                    });
                    client_gone = write_failed;
                    if result.is_ok() && !client_gone {
                        client_gone = write_list_footer(&mut writer).is_err();
                    }
                }
            }
            Operation::ListSummaries => {
                client_gone = writer
                    .write_all(b"server: received LIST_SUMMARIES\n")
                    .is_err()
                    || write_list_header(&mut writer, SUMMARIES_KEY, false).is_err();
                if !client_gone {
                    let mut write_failed = false;
                    result = db.list_summaries(|summary| {
                        write_failed = write_summary(&mut writer, summary).is_err();
                        write_failed
                    });
                    client_gone = write_failed;
                    if result.is_ok() && !client_gone {
                        client_gone = write_list_footer(&mut writer).is_err();
                    }
                }
            }
        }

        if let Err(err) = result {
            hard_fail = err.is_hard();
            tracing::warn!(worker_id, error = %err, hard_fail, "operation failed");
            client_gone |= write_server_error(&mut writer, &err.to_string()).is_err();
        }
    }

    tracing::debug!(worker_id, peer = %peer, hard_fail, "session closed");
    hard_fail
}
