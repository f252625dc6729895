//! Search predicates, sort programs and their compilation.
//!
//! A [`SearchBuilder`] produces an immutable [`Predicate`]; [`compile`] turns
//! it, together with an optional [`SortSpec`], into a single SEARCH or SORT
//! command.
//!
//! ```
//! use mailfolio_imap::search::{compile, SearchBuilder, SortKey, SortSpec};
//!
//! let predicate = SearchBuilder::new().subject("invoice").unseen().build();
//! let sort = SortSpec::new().descending(SortKey::Arrival);
//! let command = compile(&predicate, Some(&sort), true).unwrap();
//! assert_eq!(
//!     command.serialize("A1"),
//!     b"A1 UID SORT (REVERSE ARRIVAL) US-ASCII SUBJECT \"invoice\" UNSEEN\r\n"
//! );
//! ```

mod builder;
mod compile;
pub mod grammar;
mod predicate;
mod sort;

pub use builder::SearchBuilder;
pub use compile::{compile, DATE_FORMAT};
pub(crate) use compile::write_predicate;
pub use predicate::{Predicate, SearchKey};
pub use sort::{SortDirection, SortKey, SortSpec};
