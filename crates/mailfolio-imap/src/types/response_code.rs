//! Response codes (`[CODE ...]`) attached to status responses.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Machine-readable code in a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `ALERT`: text must be shown to the user.
    Alert,
    /// `BADCHARSET`: the SEARCH/SORT charset is not supported.
    BadCharset(Vec<String>),
    /// `CAPABILITY`: capability list piggybacked on a status response.
    Capability(Vec<Capability>),
    /// `PARSE`: the server failed to parse a message.
    Parse,
    /// `PERMANENTFLAGS`: flags the client may store permanently.
    PermanentFlags(Vec<Flag>),
    /// `READ-ONLY`: the mailbox was opened read-only.
    ReadOnly,
    /// `READ-WRITE`: the mailbox was opened read-write.
    ReadWrite,
    /// `TRYCREATE`: the target mailbox does not exist but could be created.
    TryCreate,
    /// `UIDNEXT`: next UID to be assigned.
    UidNext(Uid),
    /// `UIDVALIDITY`.
    UidValidity(UidValidity),
    /// `UNSEEN`: sequence number of the first unseen message.
    Unseen(SeqNum),
    /// `NONEXISTENT` (RFC 5530): the mailbox does not exist.
    NonExistent,
    /// `NOPERM` (RFC 5530): access to the mailbox is denied.
    NoPerm,
    /// Any other code, by name.
    Other(String),
}

impl ResponseCode {
    /// Whether the code says the mailbox named in the command is missing.
    #[must_use]
    pub const fn is_missing_mailbox(&self) -> bool {
        matches!(self, Self::NonExistent | Self::TryCreate)
    }
}
