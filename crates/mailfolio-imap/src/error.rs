//! Error types for the IMAP engine.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::StateRequirement;
use crate::types::{ResponseCode, Status};

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Malformed response data.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Framing violation or unexpected data from the server.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection is closed or was poisoned by an earlier fatal error.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The server refused the connection in its greeting.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// The operation is not legal in the connection's current state.
    #[error("Command requires {required} state (current: {current})")]
    InvalidState {
        /// State the operation needs.
        required: StateRequirement,
        /// Description of the state the connection is in.
        current: String,
    },

    /// The server completed the command with NO or BAD.
    #[error("Server rejected command with {status}: {text}")]
    Rejected {
        /// NO or BAD.
        status: Status,
        /// Response code, if the server sent one.
        code: Option<ResponseCode>,
        /// Human-readable text from the server.
        text: String,
    },

    /// No tagged completion arrived in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// SELECT/EXAMINE named a mailbox that does not exist.
    #[error("No such mailbox: {0}")]
    NoSuchMailbox(String),

    /// SELECT/EXAMINE was refused for lack of permission.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// A message range outside the selected mailbox.
    #[error("Invalid message range {low}:{high} (mailbox has {exists} messages)")]
    InvalidRange {
        /// Lower bound requested.
        low: u32,
        /// Upper bound requested.
        high: u32,
        /// Message count at the time of the request.
        exists: u32,
    },

    /// A search predicate without a single search key.
    #[error("Search predicate has no search keys")]
    EmptyPredicate,

    /// A KEYWORD or UNKEYWORD argument that is not an atom.
    #[error("Invalid keyword: {0:?}")]
    InvalidKeyword(String),

    /// The server omitted an attribute that was requested for this message.
    #[error("Server did not return {attribute} for message {seq}")]
    PartialFetch {
        /// Sequence number of the message when it was fetched.
        seq: u32,
        /// Name of the missing attribute.
        attribute: String,
    },

    /// The attribute was not part of the fetch that produced the record.
    #[error("{attribute} was not fetched for this message")]
    NotFetched {
        /// Name of the attribute.
        attribute: String,
    },

    /// The operation needs a capability the server does not advertise.
    #[error("Server does not support {0}")]
    Unsupported(String),
}

impl Error {
    /// Whether the error leaves the connection unusable.
    ///
    /// After a fatal error the dispatcher has shut the transport down and
    /// every later command fails with [`Error::ConnectionClosed`].
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::Parse { .. }
                | Self::Protocol(_)
                | Self::ConnectionClosed
                | Self::Bye(_)
                | Self::Timeout(_)
        )
    }

    /// Whether the server completed the command with NO or BAD.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(Error::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::Protocol("line too long".into()).is_fatal());
        assert!(!Error::EmptyPredicate.is_fatal());
        assert!(
            !Error::Rejected {
                status: Status::Bad,
                code: None,
                text: "syntax".into(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn rejected_carries_server_text() {
        let err = Error::Rejected {
            status: Status::No,
            code: None,
            text: "Mailbox is full".into(),
        };
        assert!(err.is_rejected());
        assert_eq!(
            err.to_string(),
            "Server rejected command with NO: Mailbox is full"
        );
    }

    #[test]
    fn invalid_state_names_requirement() {
        let err = Error::InvalidState {
            required: StateRequirement::Selected,
            current: "authenticated".into(),
        };
        assert_eq!(
            err.to_string(),
            "Command requires selected state (current: authenticated)"
        );
    }
}
