//! Server response parsing.
//!
//! The parser is sans-I/O: it takes one complete response, with any literals
//! already inlined by the framed reader, and builds a [`Response`].
//!
//! ```
//! use mailfolio_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(3)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyStructure, Envelope, FetchItem, Response, ResponseParser, StatusItem,
    UntaggedResponse,
};
