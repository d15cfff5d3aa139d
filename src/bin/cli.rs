//! CineVault CLI Client
//!
//! Builds one YAML request, sends it over a single TCP stream, half-closes
//! the write side, and prints everything the server streams back.

use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use clap::{Parser, Subcommand};

/// CineVault CLI
#[derive(Parser, Debug)]
#[command(name = "cinevault-cli")]
#[command(about = "CLI client for the CineVault movie server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Connection and I/O timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new movie
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        director: String,

        #[arg(long)]
        year: i32,

        /// Repeat for multiple genres
        #[arg(long = "genre", required = true)]
        genres: Vec<String>,
    },

    /// Link a genre to an existing movie
    AddGenre {
        /// The movie id
        id: i64,

        /// The genre name
        genre: String,
    },

    /// Delete a movie
    Remove {
        /// The movie id
        id: i64,
    },

    /// Fetch one movie with its genres
    Get {
        /// The movie id
        id: i64,
    },

    /// List every movie
    List,

    /// List every movie carrying a genre
    Search {
        /// The genre name
        genre: String,
    },

    /// List the (id, title) projection of every movie
    Summaries,
}

fn main() {
    let args = Args::parse();
    let request = build_request(&args.command);

    let addr = match args.server.parse() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("Invalid server address {}: {}", args.server, err);
            std::process::exit(1);
        }
    };

    let timeout = Duration::from_millis(args.timeout);
    let mut stream = match TcpStream::connect_timeout(&addr, timeout) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("Failed to connect to {}: {}", args.server, err);
            std::process::exit(1);
        }
    };
    let _ = stream.set_read_timeout(Some(timeout));
    let _ = stream.set_write_timeout(Some(timeout));
    let _ = stream.set_nodelay(true);

    if let Err(err) = stream
        .write_all(request.as_bytes())
        .and_then(|()| stream.flush())
    {
        eprintln!("Failed to send request: {err}");
        std::process::exit(1);
    }

    // half-close so the server sees end-of-stream and finishes the session
    let _ = stream.shutdown(Shutdown::Write);

    let mut response = String::new();
    if let Err(err) = stream.read_to_string(&mut response) {
        eprintln!("Failed to read response: {err}");
        std::process::exit(1);
    }
    let _ = io::stdout().write_all(response.as_bytes());
}

/// Render the chosen subcommand as one YAML operation document.
fn build_request(command: &Commands) -> String {
    let mut out = String::new();
    match command {
        Commands::Add {
            title,
            director,
            year,
            genres,
        } => {
            out.push_str("add_movie:\n");
            let _ = writeln!(out, "  title: {}", quoted(title));
            let _ = writeln!(out, "  director: {}", quoted(director));
            let _ = writeln!(out, "  release_year: {year}");
            out.push_str("  genres:\n");
            for genre in genres {
                let _ = writeln!(out, "    - {}", quoted(genre));
            }
        }
        Commands::AddGenre { id, genre } => {
            let _ = writeln!(out, "add_genre: {{ id: {id}, genre: {} }}", quoted(genre));
        }
        Commands::Remove { id } => {
            let _ = writeln!(out, "remove_movie: {id}");
        }
        Commands::Get { id } => {
            let _ = writeln!(out, "get_movie: {id}");
        }
        Commands::List => out.push_str("list_movies\n"),
        Commands::Search { genre } => {
            let _ = writeln!(out, "search_by_genre: {}", quoted(genre));
        }
        Commands::Summaries => out.push_str("list_summaries\n"),
    }
    out
}

/// Single-quote a scalar so punctuation and spaces survive the YAML trip.
fn quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_shape() {
        let request = build_request(&Commands::Add {
            title: "It's a Wonderful Life".to_owned(),
            director: "Frank Capra".to_owned(),
            year: 1946,
            genres: vec!["Drama".to_owned()],
        });
        assert!(request.starts_with("add_movie:\n"));
        assert!(request.contains("title: 'It''s a Wonderful Life'"));
        assert!(request.contains("    - 'Drama'"));
    }

    #[test]
    fn test_bare_scalar_requests() {
        assert_eq!(build_request(&Commands::List), "list_movies\n");
        assert_eq!(build_request(&Commands::Summaries), "list_summaries\n");
    }
}
