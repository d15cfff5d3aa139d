//! Protocol Module
//!
//! The wire protocol: YAML requests in, human-readable responses (with
//! embedded YAML documents) out.
//!
//! ## Request side
//! [`OpParser`] pulls YAML events straight off the socket and yields one
//! [`Operation`] at a time; payload strings borrow the parser's internal
//! builder until the next call.
//!
//! ## Response side
//! Free functions frame acknowledgements, records, list documents, and
//! error lines. Every response unit ends with a blank line.

mod operation;
mod parser;
mod response;
mod source;

pub use operation::Operation;
pub use parser::OpParser;
pub use response::{
    write_list_footer, write_list_header, write_movie, write_ok, write_parse_error,
    write_server_error, write_summary, MOVIES_KEY, SELECTED_MOVIES_KEY, SUMMARIES_KEY,
};
pub use source::{ErrorSlot, ReadChars};
