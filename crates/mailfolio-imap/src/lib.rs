//! # mailfolio-imap
//!
//! An IMAP4rev1 (RFC 3501) client engine built around a single-flight
//! command dispatcher, with SORT (RFC 5256), UNSELECT (RFC 3691) and
//! LITERAL+/LITERAL- (RFC 7888) when the server offers them.
//!
//! ## Features
//!
//! - **Single-flight dispatcher**: one task owns the transport; any number of
//!   cloned [`Connection`] handles queue commands to it and wait on their own
//!   completion
//! - **Literal-aware framing**: `{n}` literals are read as raw bytes, and
//!   synchronizing literals wait for the server's `+`
//! - **Search and sort compiler**: a [`SearchBuilder`] produces an immutable
//!   [`Predicate`] that compiles into one SEARCH or SORT command
//! - **Folder sessions**: [`Folder`] scopes search, fetch, expunge and counts
//!   to one selection and refuses to run once that selection is gone
//! - **Fetch planning**: pre-fetch profiles become batched FETCH commands;
//!   omitted attributes are reported per message instead of failing a batch
//! - **TLS via rustls**: implicit TLS or STARTTLS without OpenSSL
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailfolio_imap::fetch::PrefetchItem;
//! use mailfolio_imap::search::{SearchBuilder, SortKey, SortSpec};
//! use mailfolio_imap::{Config, Connection};
//!
//! # async fn run() -> mailfolio_imap::Result<()> {
//! let conn = Connection::connect(Config::new("imap.example.com")).await?;
//! conn.login("user@example.com", "password").await?;
//!
//! let mut inbox = conn.select("INBOX").await?;
//! inbox.add_prefetch_items([PrefetchItem::Envelope]);
//!
//! let predicate = SearchBuilder::new().subject("invoice").build();
//! let newest_first = SortSpec::new().descending(SortKey::Arrival);
//! for record in inbox.search(&predicate, Some(&newest_first)).await? {
//!     println!("{:?}", record.envelope()?.subject);
//! }
//!
//! inbox.close(false).await?;
//! conn.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login ──→ Authenticated ── select/examine ──→ Selected
//!                                     ↑                                 │
//!                                     └──────── close/unselect ─────────┘
//! any state ── logout / BYE ──→ Logout
//! ```
//!
//! Commands sent in the wrong state fail with [`Error::InvalidState`]
//! without being written.
//!
//! ## Modules
//!
//! - [`command`]: commands and their wire encoding
//! - [`connection`]: configuration, transport and the connection handle
//! - [`fetch`]: pre-fetch profiles, FETCH planning and message records
//! - [`folder`]: folder sessions
//! - [`handler`]: listeners for unsolicited mailbox updates
//! - [`parser`]: sans-I/O response parser
//! - [`protocol`]: the session state tracker
//! - [`search`]: predicates, sort programs and their compiler
//! - [`types`]: core IMAP types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod fetch;
pub mod folder;
pub mod handler;
pub mod parser;
pub mod protocol;
pub mod search;
pub mod types;

pub use command::{Command, FetchAttribute, StoreAction, TagGenerator};
pub use connection::{Config, ConfigBuilder, Connection, FramedStream, ImapStream, Limits, Security};
pub use error::{Error, Result};
pub use fetch::{Field, MessageRecord, PrefetchItem, PrefetchProfile};
pub use folder::{AccessMode, Folder, MessageCounts};
pub use handler::{ChannelListener, LoggingListener, MailboxEvent, MailboxListener, NoopListener};
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use protocol::{CommandResult, ConnectionSnapshot, ProtocolState};
pub use search::{Predicate, SearchBuilder, SearchKey, SortKey, SortSpec};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxStatus, ResponseCode, SeqNum,
    SequenceSet, Status, Tag, Uid, UidValidity,
};

/// IMAP protocol version spoken.
pub const IMAP_VERSION: &str = "IMAP4rev1";
