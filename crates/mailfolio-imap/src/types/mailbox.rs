//! Mailbox names, LIST data and per-mailbox status.

use std::fmt;

use super::{Flags, SeqNum, Uid, UidValidity};

/// Mailbox name as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(String);

impl Mailbox {
    /// Wraps a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two names refer to the same mailbox. `INBOX` is
    /// case-insensitive, everything else is compared exactly.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        if self.0.eq_ignore_ascii_case("INBOX") {
            other.0.eq_ignore_ascii_case("INBOX")
        } else {
            self.0 == other.0
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mailbox {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Mailbox {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Mailbox data reported by SELECT/EXAMINE and kept current by untagged
/// EXISTS, RECENT, EXPUNGE and FLAGS responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// Number of messages with `\Recent`.
    pub recent: u32,
    /// First unseen message, if reported.
    pub first_unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY of the mailbox.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined in the mailbox.
    pub flags: Flags,
    /// Flags that can be changed permanently.
    pub permanent_flags: Flags,
    /// Whether the server opened the mailbox read-only.
    pub read_only: bool,
}

/// One LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Name attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

/// Name attribute from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noinferiors`
    NoInferiors,
    /// `\Noselect`
    NoSelect,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\HasChildren`
    HasChildren,
    /// `\HasNoChildren`
    HasNoChildren,
    /// Any other attribute, verbatim.
    Other(String),
}

impl MailboxAttribute {
    /// Parses an attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\NOSELECT" => Self::NoSelect,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            _ => Self::Other(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_compares_case_insensitively() {
        assert!(Mailbox::new("inbox").same_as(&Mailbox::inbox()));
        assert!(!Mailbox::new("Archive").same_as(&Mailbox::new("archive")));
    }

    #[test]
    fn attributes_parse() {
        assert_eq!(MailboxAttribute::parse("\\Noselect"), MailboxAttribute::NoSelect);
        assert_eq!(
            MailboxAttribute::parse("\\Trash"),
            MailboxAttribute::Other("\\Trash".into())
        );
    }
}
