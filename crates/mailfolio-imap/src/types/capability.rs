//! Completion status and server capabilities.

use std::fmt;

/// Status carried by a tagged completion or a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed.
    Ok,
    /// Command failed for an operational reason.
    No,
    /// Command was not understood or not allowed.
    Bad,
    /// Greeting of an already authenticated connection.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Whether the status reports success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501).
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051).
    Imap4Rev2,
    /// `SORT` (RFC 5256).
    Sort,
    /// `UNSELECT` (RFC 3691).
    Unselect,
    /// `UIDPLUS` (RFC 4315).
    UidPlus,
    /// `LITERAL+`: non-synchronizing literals of any size (RFC 7888).
    LiteralPlus,
    /// `LITERAL-`: non-synchronizing literals up to 4096 octets (RFC 7888).
    LiteralMinus,
    /// `STARTTLS`.
    StartTls,
    /// `LOGINDISABLED`.
    LoginDisabled,
    /// `IDLE` (RFC 2177). Recognised, never used by this crate.
    Idle,
    /// `AUTH=<mechanism>`.
    Auth(String),
    /// Anything else, verbatim.
    Other(String),
}

impl Capability {
    /// Parses a capability atom, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "SORT" => Self::Sort,
            "UNSELECT" => Self::Unselect,
            "UIDPLUS" => Self::UidPlus,
            "LITERAL+" => Self::LiteralPlus,
            "LITERAL-" => Self::LiteralMinus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "IDLE" => Self::Idle,
            _ => match upper.strip_prefix("AUTH=") {
                Some(_) => Self::Auth(s[5..].to_string()),
                None => Self::Other(s.to_string()),
            },
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap4Rev1 => f.write_str("IMAP4rev1"),
            Self::Imap4Rev2 => f.write_str("IMAP4rev2"),
            Self::Sort => f.write_str("SORT"),
            Self::Unselect => f.write_str("UNSELECT"),
            Self::UidPlus => f.write_str("UIDPLUS"),
            Self::LiteralPlus => f.write_str("LITERAL+"),
            Self::LiteralMinus => f.write_str("LITERAL-"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::LoginDisabled => f.write_str("LOGINDISABLED"),
            Self::Idle => f.write_str("IDLE"),
            Self::Auth(mechanism) => write!(f, "AUTH={mechanism}"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_capabilities() {
        assert_eq!(Capability::parse("sort"), Capability::Sort);
        assert_eq!(Capability::parse("UNSELECT"), Capability::Unselect);
        assert_eq!(Capability::parse("LITERAL+"), Capability::LiteralPlus);
        assert_eq!(
            Capability::parse("AUTH=XOAUTH2"),
            Capability::Auth("XOAUTH2".into())
        );
        assert_eq!(
            Capability::parse("SORT=DISPLAY"),
            Capability::Other("SORT=DISPLAY".into())
        );
    }

    #[test]
    fn display_round_trips_known_names() {
        for name in ["IMAP4rev1", "SORT", "LITERAL-", "AUTH=PLAIN", "X-GM-EXT-1"] {
            assert_eq!(Capability::parse(name).to_string(), name);
        }
    }

    #[test]
    fn status_success() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert_eq!(Status::Bad.to_string(), "BAD");
    }
}
