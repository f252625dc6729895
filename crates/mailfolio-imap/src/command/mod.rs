//! IMAP command builder.
//!
//! This module provides the client commands this crate issues and their wire
//! encoding.

mod tag_generator;
mod types;
mod writer;

use crate::parser::UntaggedResponse;
use crate::search::{Predicate, SortSpec, write_predicate};
use crate::types::{Mailbox, SequenceSet};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, StatusAttribute, StoreAction};
pub use writer::{
    CommandWriter, EncodedCommand, Fragment, LITERAL_MINUS_LIMIT, LiteralMode, LiteralSupport,
    StringForm,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    // Authenticated State Commands
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// RENAME command.
    Rename {
        /// Current name.
        from: Mailbox,
        /// New name.
        to: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern with `*` and `%` wildcards.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox to query.
        mailbox: Mailbox,
        /// Requested items.
        items: Vec<StatusAttribute>,
    },

    // Selected State Commands
    /// CLOSE command (implicitly expunges a read-write mailbox).
    Close,
    /// UNSELECT command (RFC 3691).
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// SEARCH command.
    Search {
        /// Charset announced with `CHARSET`.
        charset: Option<String>,
        /// Search criteria.
        criteria: Predicate,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// SORT command (RFC 5256).
    Sort {
        /// Sort program.
        program: SortSpec,
        /// Charset of the search strings. SORT always names one.
        charset: String,
        /// Search criteria.
        criteria: Predicate,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Message set.
        sequence: SequenceSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
        /// Interpret the set as UIDs.
        uid: bool,
    },
    /// STORE command.
    Store {
        /// Message set.
        sequence: SequenceSet,
        /// Flag change.
        action: StoreAction,
        /// Interpret the set as UIDs.
        uid: bool,
        /// Suppress the untagged FETCH echo.
        silent: bool,
    },
}

impl Command {
    /// Command keyword, without any `UID` prefix.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::List { .. } => "LIST",
            Self::Status { .. } => "STATUS",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Sort { .. } => "SORT",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
        }
    }

    /// Returns true if re-issuing the command after a lost connection cannot
    /// change the outcome.
    ///
    /// Flag additions and removals are excluded: another client may have
    /// changed the flags in between.
    #[must_use]
    pub const fn is_retry_safe(&self) -> bool {
        match self {
            Self::Capability
            | Self::Noop
            | Self::Select { .. }
            | Self::Examine { .. }
            | Self::List { .. }
            | Self::Status { .. }
            | Self::Search { .. }
            | Self::Sort { .. }
            | Self::Fetch { .. } => true,
            Self::Store { action, .. } => matches!(action, StoreAction::Replace(_)),
            Self::Logout
            | Self::StartTls
            | Self::Login { .. }
            | Self::Create { .. }
            | Self::Delete { .. }
            | Self::Rename { .. }
            | Self::Close
            | Self::Unselect
            | Self::Expunge => false,
        }
    }

    /// Returns true if `response` is data this command asked for and belongs
    /// in its result rather than with the unsolicited listener.
    #[must_use]
    pub const fn expects(&self, response: &UntaggedResponse) -> bool {
        match self {
            Self::Capability | Self::Login { .. } => {
                matches!(response, UntaggedResponse::Capability(_))
            }
            Self::Select { .. } | Self::Examine { .. } => matches!(
                response,
                UntaggedResponse::Flags(_)
                    | UntaggedResponse::Exists(_)
                    | UntaggedResponse::Recent(_)
                    | UntaggedResponse::Ok { code: Some(_), .. }
            ),
            Self::List { .. } => matches!(response, UntaggedResponse::List(_)),
            Self::Status { .. } => matches!(response, UntaggedResponse::Status { .. }),
            Self::Search { .. } => matches!(response, UntaggedResponse::Search(_)),
            Self::Sort { .. } => matches!(response, UntaggedResponse::Sort(_)),
            Self::Fetch { .. } | Self::Store { .. } => {
                matches!(response, UntaggedResponse::Fetch { .. })
            }
            Self::Expunge => matches!(response, UntaggedResponse::Expunge(_)),
            Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Create { .. }
            | Self::Delete { .. }
            | Self::Rename { .. }
            | Self::Close
            | Self::Unselect => false,
        }
    }

    /// Encodes the command with the given tag.
    #[must_use]
    pub fn encode(&self, tag: &str, literals: LiteralSupport) -> EncodedCommand {
        let mut w = CommandWriter::new(tag, literals);

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Close
            | Self::Unselect
            | Self::Expunge => w.raw(self.name()),

            Self::Login { username, password } => {
                w.raw("LOGIN ");
                w.astring(username);
                w.sp();
                w.astring(password);
            }

            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox } => {
                w.raw(self.name());
                w.sp();
                w.astring(mailbox.as_str());
            }
            Self::Rename { from, to } => {
                w.raw("RENAME ");
                w.astring(from.as_str());
                w.sp();
                w.astring(to.as_str());
            }
            Self::List { reference, pattern } => {
                w.raw("LIST ");
                w.astring(reference);
                w.sp();
                w.astring(pattern);
            }
            Self::Status { mailbox, items } => {
                w.raw("STATUS ");
                w.astring(mailbox.as_str());
                let names: Vec<&str> = items.iter().map(|item| item.as_str()).collect();
                w.raw(&format!(" ({})", names.join(" ")));
            }

            Self::Search {
                charset,
                criteria,
                uid,
            } => {
                if *uid {
                    w.raw("UID ");
                }
                w.raw("SEARCH");
                if let Some(charset) = charset {
                    w.raw(" CHARSET ");
                    w.astring(charset);
                }
                w.sp();
                write_predicate(&mut w, criteria);
            }
            Self::Sort {
                program,
                charset,
                criteria,
                uid,
            } => {
                if *uid {
                    w.raw("UID ");
                }
                w.raw(&format!("SORT {program} "));
                w.astring(charset);
                w.sp();
                write_predicate(&mut w, criteria);
            }
            Self::Fetch {
                sequence,
                items,
                uid,
            } => {
                if *uid {
                    w.raw("UID ");
                }
                w.raw(&format!("FETCH {sequence} "));
                w.fetch_items(items);
            }
            Self::Store {
                sequence,
                action,
                uid,
                silent,
            } => {
                if *uid {
                    w.raw("UID ");
                }
                w.raw(&format!("STORE {sequence} "));
                w.store_action(action, *silent);
            }
        }

        w.finish()
    }

    /// Serializes the command into one buffer, ignoring continuation points.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        self.encode(tag, LiteralSupport::Synchronizing).to_bytes()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use crate::search::{SearchKey, SortKey};
    use crate::types::{Flag, Flags, SeqNum};

    use super::*;

    #[test]
    fn test_capability_command() {
        assert_eq!(Command::Capability.serialize("A001"), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 LOGIN user pass\r\n");
    }

    #[test]
    fn test_login_quoted() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 LOGIN user@example.com \"pass word\"\r\n"
        );
    }

    #[test]
    fn test_login_literal_password() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pässword".to_string(),
        };
        let encoded = cmd.encode("A001", LiteralSupport::Synchronizing);
        assert!(encoded.needs_continuation());
        assert_eq!(
            encoded.fragments()[0],
            Fragment::Line(b"A001 LOGIN user {9}\r\n".to_vec())
        );
    }

    #[test]
    fn test_select_command() {
        let cmd = Command::Select {
            mailbox: Mailbox::inbox(),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 SELECT INBOX\r\n");
    }

    #[test]
    fn test_examine_quoted_mailbox() {
        let cmd = Command::Examine {
            mailbox: Mailbox::new("Sent Items"),
        };
        assert_eq!(cmd.serialize("A002"), b"A002 EXAMINE \"Sent Items\"\r\n");
    }

    #[test]
    fn test_list_command() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_status_command() {
        let cmd = Command::Status {
            mailbox: Mailbox::inbox(),
            items: vec![StatusAttribute::Messages, StatusAttribute::Unseen],
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 STATUS INBOX (MESSAGES UNSEEN)\r\n"
        );
    }

    #[test]
    fn test_uid_fetch_command() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::range(1, 5).unwrap(),
            items: vec![FetchAttribute::Uid, FetchAttribute::Flags],
            uid: true,
        };
        assert_eq!(cmd.serialize("A001"), b"A001 UID FETCH 1:5 (UID FLAGS)\r\n");
    }

    #[test]
    fn test_store_command() {
        let cmd = Command::Store {
            sequence: SequenceSet::single(1).unwrap(),
            action: StoreAction::Add(vec![Flag::Seen]),
            uid: false,
            silent: false,
        };
        assert_eq!(cmd.serialize("A001"), b"A001 STORE 1 +FLAGS (\\Seen)\r\n");
    }

    #[test]
    fn test_search_command() {
        let cmd = Command::Search {
            charset: None,
            criteria: Predicate::Key(SearchKey::Unseen),
            uid: true,
        };
        assert_eq!(cmd.serialize("A001"), b"A001 UID SEARCH UNSEEN\r\n");
    }

    #[test]
    fn test_sort_command() {
        let cmd = Command::Sort {
            program: SortSpec::new().descending(SortKey::Date),
            charset: "US-ASCII".to_string(),
            criteria: Predicate::Key(SearchKey::All),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 UID SORT (REVERSE DATE) US-ASCII ALL\r\n"
        );
    }

    #[test]
    fn test_retry_safety() {
        assert!(Command::Noop.is_retry_safe());
        assert!(!Command::Expunge.is_retry_safe());
        let add = Command::Store {
            sequence: SequenceSet::Last,
            action: StoreAction::Add(vec![Flag::Flagged]),
            uid: true,
            silent: true,
        };
        assert!(!add.is_retry_safe());
        let replace = Command::Store {
            sequence: SequenceSet::Last,
            action: StoreAction::Replace(vec![Flag::Flagged]),
            uid: true,
            silent: true,
        };
        assert!(replace.is_retry_safe());
    }

    #[test]
    fn test_expected_responses() {
        let search = Command::Search {
            charset: None,
            criteria: Predicate::Key(SearchKey::All),
            uid: false,
        };
        assert!(search.expects(&UntaggedResponse::Search(vec![1, 2])));
        assert!(!search.expects(&UntaggedResponse::Exists(3)));
        assert!(!search.expects(&UntaggedResponse::Expunge(SeqNum::new(1).unwrap())));

        let select = Command::Select {
            mailbox: Mailbox::inbox(),
        };
        assert!(select.expects(&UntaggedResponse::Flags(Flags::new())));
        assert!(select.expects(&UntaggedResponse::Exists(3)));
        assert!(!select.expects(&UntaggedResponse::Ok {
            code: None,
            text: "hello".into()
        }));
        assert!(Command::Expunge.expects(&UntaggedResponse::Expunge(SeqNum::new(1).unwrap())));
    }
}
