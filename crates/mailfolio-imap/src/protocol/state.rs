//! Connection phases and the command legality table (RFC 3501 section 3).

use std::fmt;

use crate::command::Command;
use crate::types::{Mailbox, ResponseCode, Status};
use crate::{Error, Result};

/// Protocol state of a connection.
///
/// - `NotAuthenticated`: after an OK greeting, until LOGIN succeeds
/// - `Authenticated`: logged in, no mailbox selected
/// - `Selected`: a mailbox is open
/// - `Logout`: LOGOUT completed or the server sent BYE; nothing more may be sent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Waiting for credentials.
    #[default]
    NotAuthenticated,
    /// Logged in.
    Authenticated,
    /// A mailbox is selected.
    Selected(SelectedState),
    /// Terminal.
    Logout,
}

/// The mailbox held open in the selected state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Name of the selected mailbox.
    pub mailbox: Mailbox,
    /// Opened with EXAMINE, or downgraded by the server with `[READ-ONLY]`.
    pub read_only: bool,
}

/// State a command needs, as reported by [`Error::InvalidState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRequirement {
    /// Any state but logout.
    Active,
    /// Not authenticated.
    NotAuthenticated,
    /// Authenticated or selected.
    Authenticated,
    /// A selected mailbox.
    Selected,
    /// A mailbox selected read-write.
    SelectedReadWrite,
}

impl StateRequirement {
    /// Requirement of `command`.
    #[must_use]
    pub const fn of(command: &Command) -> Self {
        match command {
            Command::Capability | Command::Noop | Command::Logout => Self::Active,
            Command::StartTls | Command::Login { .. } => Self::NotAuthenticated,
            Command::Select { .. }
            | Command::Examine { .. }
            | Command::Create { .. }
            | Command::Delete { .. }
            | Command::Rename { .. }
            | Command::List { .. }
            | Command::Status { .. } => Self::Authenticated,
            Command::Close
            | Command::Unselect
            | Command::Search { .. }
            | Command::Sort { .. }
            | Command::Fetch { .. } => Self::Selected,
            Command::Store { .. } | Command::Expunge => Self::SelectedReadWrite,
        }
    }

    /// Whether `state` satisfies the requirement.
    #[must_use]
    pub const fn is_met_by(self, state: &ProtocolState) -> bool {
        match (self, state) {
            (_, ProtocolState::Logout) => false,
            (Self::Active, _)
            | (Self::NotAuthenticated, ProtocolState::NotAuthenticated)
            | (Self::Authenticated, ProtocolState::Authenticated | ProtocolState::Selected(_))
            | (Self::Selected, ProtocolState::Selected(_)) => true,
            (Self::SelectedReadWrite, ProtocolState::Selected(selected)) => !selected.read_only,
            _ => false,
        }
    }
}

impl fmt::Display for StateRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::NotAuthenticated => "not authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected => "selected",
            Self::SelectedReadWrite => "read-write selected",
        })
    }
}

impl ProtocolState {
    /// Returns `true` if logged in (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// The selected mailbox, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<&SelectedState> {
        match self {
            Self::Selected(state) => Some(state),
            _ => None,
        }
    }

    /// Fails with [`Error::InvalidState`] if `command` may not be sent now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] naming the missing requirement.
    pub fn check(&self, command: &Command) -> Result<()> {
        let required = StateRequirement::of(command);
        if required.is_met_by(self) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                required,
                current: self.to_string(),
            })
        }
    }

    /// State after `command` completed with `status`.
    ///
    /// A tagged NO to SELECT/EXAMINE still leaves the selected state, since
    /// the server closes the previous mailbox before trying the new one. BAD
    /// means the command was not processed and changes nothing, except for
    /// LOGOUT which always ends the session.
    #[must_use]
    pub fn after(&self, command: &Command, status: Status, code: Option<&ResponseCode>) -> Self {
        if matches!(command, Command::Logout) {
            return Self::Logout;
        }
        match (command, status) {
            (Command::Login { .. }, Status::Ok) => Self::Authenticated,
            (Command::Select { mailbox }, Status::Ok) => Self::Selected(SelectedState {
                mailbox: mailbox.clone(),
                read_only: matches!(code, Some(ResponseCode::ReadOnly)),
            }),
            (Command::Examine { mailbox }, Status::Ok) => Self::Selected(SelectedState {
                mailbox: mailbox.clone(),
                read_only: true,
            }),
            (Command::Select { .. } | Command::Examine { .. }, Status::No)
            | (Command::Close | Command::Unselect, Status::Ok) => Self::Authenticated,
            _ => self.clone(),
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => f.write_str("not authenticated"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Selected(SelectedState {
                mailbox,
                read_only: true,
            }) => write!(f, "selected ({mailbox}, read-only)"),
            Self::Selected(SelectedState { mailbox, .. }) => write!(f, "selected ({mailbox})"),
            Self::Logout => f.write_str("logout"),
        }
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
    use crate::search::{Predicate, SearchKey};
    use crate::types::SequenceSet;

    use super::*;

    fn selected(read_only: bool) -> ProtocolState {
        ProtocolState::Selected(SelectedState {
            mailbox: Mailbox::inbox(),
            read_only,
        })
    }

    fn search() -> Command {
        Command::Search {
            charset: None,
            criteria: Predicate::Key(SearchKey::All),
            uid: true,
        }
    }

    #[test]
    fn default_is_not_authenticated() {
        assert_eq!(ProtocolState::default(), ProtocolState::NotAuthenticated);
    }

    #[test]
    fn search_requires_selected() {
        let err = ProtocolState::Authenticated.check(&search()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                required: StateRequirement::Selected,
                ..
            }
        ));
        assert!(selected(true).check(&search()).is_ok());
    }

    #[test]
    fn expunge_requires_read_write() {
        assert!(selected(false).check(&Command::Expunge).is_ok());
        let err = selected(true).check(&Command::Expunge).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command requires read-write selected state (current: selected (INBOX, read-only))"
        );
    }

    #[test]
    fn login_only_before_authentication() {
        let login = Command::Login {
            username: "u".into(),
            password: "p".into(),
        };
        assert!(ProtocolState::NotAuthenticated.check(&login).is_ok());
        assert!(ProtocolState::Authenticated.check(&login).is_err());
        assert!(ProtocolState::NotAuthenticated
            .check(&Command::Select {
                mailbox: Mailbox::inbox()
            })
            .is_err());
    }

    #[test]
    fn nothing_after_logout() {
        assert!(ProtocolState::Logout.check(&Command::Noop).is_err());
        assert!(ProtocolState::Logout.check(&Command::Logout).is_err());
    }

    #[test]
    fn transitions() {
        let login = Command::Login {
            username: "u".into(),
            password: "p".into(),
        };
        let state = ProtocolState::NotAuthenticated;
        assert_eq!(state.after(&login, Status::No, None), state);
        assert_eq!(
            state.after(&login, Status::Ok, None),
            ProtocolState::Authenticated
        );

        let select = Command::Select {
            mailbox: Mailbox::inbox(),
        };
        assert_eq!(
            ProtocolState::Authenticated.after(&select, Status::Ok, None),
            selected(false)
        );
        assert_eq!(
            ProtocolState::Authenticated.after(&select, Status::Ok, Some(&ResponseCode::ReadOnly)),
            selected(true)
        );
        assert_eq!(
            selected(false).after(&select, Status::No, None),
            ProtocolState::Authenticated
        );
        assert_eq!(selected(false).after(&select, Status::Bad, None), selected(false));
        assert_eq!(
            selected(false).after(&Command::Close, Status::Ok, None),
            ProtocolState::Authenticated
        );
        assert_eq!(
            selected(false).after(&Command::Logout, Status::Bad, None),
            ProtocolState::Logout
        );
    }

    #[test]
    fn fetch_keeps_state() {
        let fetch = Command::Fetch {
            sequence: SequenceSet::Last,
            items: vec![],
            uid: false,
        };
        assert_eq!(selected(true).after(&fetch, Status::Ok, None), selected(true));
    }
}
