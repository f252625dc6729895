//! Sans-I/O protocol tracker.
//!
//! [`Protocol`] holds everything the dispatcher knows about the session:
//! the phase, the server's capabilities, the status of the selected mailbox,
//! a selection id and the numbering epoch. It never touches the transport;
//! the dispatcher feeds it the commands it writes and the responses it reads.
//!
//! The selection id changes whenever the selected mailbox changes or goes
//! away (select, close, failed select, rename or delete of the selected
//! mailbox, logout). The epoch counts EXPUNGE responses: sequence numbers
//! seen under an older epoch may no longer name the same message.

mod state;

pub use state::{ProtocolState, SelectedState, StateRequirement};

use crate::command::{Command, LiteralSupport};
use crate::parser::{Response, UntaggedResponse};
use crate::types::{Capability, MailboxStatus, ResponseCode, Status};
use crate::{Error, Result};

/// Completion of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Completion status.
    pub status: Status,
    /// Response code of the tagged completion.
    pub code: Option<ResponseCode>,
    /// Text of the tagged completion.
    pub text: String,
    /// Untagged responses routed to this command.
    pub responses: Vec<UntaggedResponse>,
}

impl CommandResult {
    /// Returns true if the command completed with OK.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Keeps the result if it is OK.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for NO and BAD completions.
    pub fn ensure_ok(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::Rejected {
                status: self.status,
                code: self.code,
                text: self.text,
            })
        }
    }

    /// Returns the routed responses of an OK completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for NO and BAD completions.
    pub fn into_result(self) -> Result<Vec<UntaggedResponse>> {
        self.ensure_ok().map(|result| result.responses)
    }
}

/// Point-in-time view of a connection, published by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    /// Protocol phase.
    pub state: ProtocolState,
    /// Advertised capabilities.
    pub capabilities: Vec<Capability>,
    /// Status of the selected mailbox.
    pub mailbox: Option<MailboxStatus>,
    /// Current selection id.
    pub selection: u64,
    /// Current numbering epoch.
    pub epoch: u64,
    /// False once the dispatcher has stopped.
    pub usable: bool,
}

/// Session state tracker.
#[derive(Debug, Default)]
pub struct Protocol {
    state: ProtocolState,
    capabilities: Vec<Capability>,
    mailbox: Option<MailboxStatus>,
    /// Status collected while a SELECT/EXAMINE is in flight.
    selecting: Option<MailboxStatus>,
    selection: u64,
    epoch: u64,
}

impl Protocol {
    /// Creates a tracker in the not-authenticated state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bye`] if the server refused the connection and
    /// [`Error::Protocol`] if the first response is not a greeting.
    pub fn greet(&mut self, response: &Response) -> Result<()> {
        let Response::Untagged(data) = response else {
            return Err(Error::Protocol(format!("Expected greeting, got {response:?}")));
        };
        match data {
            UntaggedResponse::Ok { code, .. } => {
                self.state = ProtocolState::NotAuthenticated;
                self.absorb_code(code.as_ref());
                Ok(())
            }
            UntaggedResponse::PreAuth { code, .. } => {
                self.state = ProtocolState::Authenticated;
                self.absorb_code(code.as_ref());
                Ok(())
            }
            UntaggedResponse::Bye { text, .. } => {
                self.state = ProtocolState::Logout;
                Err(Error::Bye(text.clone()))
            }
            other => Err(Error::Protocol(format!("Expected greeting, got {other:?}"))),
        }
    }

    /// Protocol phase.
    #[must_use]
    pub const fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Advertised capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns true if `capability` is advertised.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Status of the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&MailboxStatus> {
        self.mailbox.as_ref()
    }

    /// Current selection id.
    #[must_use]
    pub const fn selection(&self) -> u64 {
        self.selection
    }

    /// Current numbering epoch.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Literal mode the server allows.
    #[must_use]
    pub fn literal_support(&self) -> LiteralSupport {
        if self.has_capability(&Capability::LiteralPlus) {
            LiteralSupport::Plus
        } else if self.has_capability(&Capability::LiteralMinus) {
            LiteralSupport::Minus
        } else {
            LiteralSupport::Synchronizing
        }
    }

    /// Checks that `command` may be sent, optionally on behalf of the
    /// selection `selection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the phase does not allow the command
    /// or the selection it was issued for is no longer current.
    pub fn check(&self, command: &Command, selection: Option<u64>) -> Result<()> {
        if let Some(selection) = selection {
            if selection != self.selection || !self.state.is_selected() {
                return Err(Error::InvalidState {
                    required: StateRequirement::Selected,
                    current: format!("{}, selection changed", self.state),
                });
            }
        }
        self.state.check(command)
    }

    /// Records that `command` has been written.
    pub fn begin(&mut self, command: &Command) {
        if matches!(command, Command::Select { .. } | Command::Examine { .. }) {
            self.selecting = Some(MailboxStatus::default());
        }
    }

    /// Applies an untagged response, whichever command it was routed to.
    pub fn observe(&mut self, response: &UntaggedResponse) {
        match response {
            UntaggedResponse::Capability(caps) => self.capabilities.clone_from(caps),
            UntaggedResponse::Ok { code, .. }
            | UntaggedResponse::No { code, .. }
            | UntaggedResponse::Bad { code, .. } => self.absorb_code(code.as_ref()),
            UntaggedResponse::Bye { .. } => {
                if self.state.is_selected() {
                    self.selection += 1;
                }
                self.state = ProtocolState::Logout;
            }
            UntaggedResponse::Exists(n) => {
                if let Some(status) = self.target() {
                    status.exists = *n;
                }
            }
            UntaggedResponse::Recent(n) => {
                if let Some(status) = self.target() {
                    status.recent = *n;
                }
            }
            UntaggedResponse::Flags(flags) => {
                if let Some(status) = self.target() {
                    status.flags = flags.clone();
                }
            }
            UntaggedResponse::Expunge(_) => {
                self.epoch += 1;
                if let Some(status) = self.target() {
                    status.exists = status.exists.saturating_sub(1);
                }
            }
            _ => {}
        }
    }

    /// Applies the tagged completion of `command`.
    pub fn complete(&mut self, command: &Command, status: Status, code: Option<&ResponseCode>) {
        let was_selected = self.state.is_selected();
        let next = self.state.after(command, status, code);
        self.absorb_code(code);

        match command {
            Command::Select { .. } | Command::Examine { .. } => {
                let staged = self.selecting.take();
                if let ProtocolState::Selected(selected) = &next {
                    let mut mailbox = staged.unwrap_or_default();
                    mailbox.read_only = selected.read_only;
                    self.mailbox = Some(mailbox);
                    self.selection += 1;
                } else if was_selected && !next.is_selected() {
                    self.mailbox = None;
                    self.selection += 1;
                }
            }
            Command::Close | Command::Unselect | Command::Logout
                if was_selected && !next.is_selected() =>
            {
                self.mailbox = None;
                self.selection += 1;
            }
            Command::Rename { from: gone, .. } | Command::Delete { mailbox: gone }
                if status.is_ok() =>
            {
                let affected = self
                    .state
                    .selected()
                    .is_some_and(|selected| selected.mailbox.same_as(gone));
                if affected {
                    self.selection += 1;
                }
            }
            _ => {}
        }

        self.state = next;
    }

    /// Snapshot for publication.
    #[must_use]
    pub fn snapshot(&self, usable: bool) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.state.clone(),
            capabilities: self.capabilities.clone(),
            mailbox: self.mailbox.clone(),
            selection: self.selection,
            epoch: self.epoch,
            usable,
        }
    }

    fn target(&mut self) -> Option<&mut MailboxStatus> {
        self.selecting.as_mut().or(self.mailbox.as_mut())
    }

    fn absorb_code(&mut self, code: Option<&ResponseCode>) {
        let Some(code) = code else { return };
        if let ResponseCode::Capability(caps) = code {
            self.capabilities.clone_from(caps);
            return;
        }
        let Some(status) = self.target() else { return };
        match code {
            ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
            ResponseCode::UidNext(n) => status.uid_next = Some(*n),
            ResponseCode::Unseen(n) => status.first_unseen = Some(*n),
            ResponseCode::PermanentFlags(flags) => {
                status.permanent_flags = flags.iter().cloned().collect();
            }
            _ => {}
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
    use crate::parser::ResponseParser;
    use crate::types::{Flag, Mailbox, SeqNum};

    use super::*;

    fn untagged(line: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(line).unwrap() {
            Response::Untagged(data) => data,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    fn logged_in() -> Protocol {
        let mut protocol = Protocol::new();
        let greeting =
            ResponseParser::parse(b"* PREAUTH [CAPABILITY IMAP4rev1 LITERAL+] hi\r\n").unwrap();
        protocol.greet(&greeting).unwrap();
        protocol
    }

    fn select(protocol: &mut Protocol, name: &str, lines: &[&[u8]], code: Option<ResponseCode>) {
        let command = Command::Select {
            mailbox: Mailbox::new(name),
        };
        protocol.check(&command, None).unwrap();
        protocol.begin(&command);
        for line in lines {
            protocol.observe(&untagged(line));
        }
        protocol.complete(&command, Status::Ok, code.as_ref());
    }

    #[test]
    fn greeting_sets_state_and_capabilities() {
        let protocol = logged_in();
        assert_eq!(protocol.state(), &ProtocolState::Authenticated);
        assert!(protocol.has_capability(&Capability::LiteralPlus));
        assert_eq!(protocol.literal_support(), LiteralSupport::Plus);
    }

    #[test]
    fn bye_greeting_is_error() {
        let mut protocol = Protocol::new();
        let err = protocol
            .greet(&ResponseParser::parse(b"* BYE too many connections\r\n").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
        assert_eq!(protocol.state(), &ProtocolState::Logout);
    }

    #[test]
    fn select_collects_mailbox_status() {
        let mut protocol = logged_in();
        select(
            &mut protocol,
            "INBOX",
            &[
                b"* 172 EXISTS\r\n",
                b"* 1 RECENT\r\n",
                b"* OK [UNSEEN 12] first unseen\r\n",
                b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n",
                b"* OK [UIDNEXT 4392] next\r\n",
                b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
                b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n",
            ],
            Some(ResponseCode::ReadWrite),
        );
        let status = protocol.mailbox().unwrap();
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);
        assert_eq!(status.first_unseen, SeqNum::new(12));
        assert_eq!(status.uid_validity.unwrap().get(), 3_857_529_045);
        assert_eq!(status.uid_next.unwrap().get(), 4392);
        assert!(status.flags.contains(&Flag::Draft));
        assert!(status.permanent_flags.contains(&Flag::MayCreate));
        assert!(!status.read_only);
        assert_eq!(protocol.selection(), 1);
    }

    #[test]
    fn read_only_downgrade() {
        let mut protocol = logged_in();
        select(&mut protocol, "Shared", &[b"* 3 EXISTS\r\n"], Some(ResponseCode::ReadOnly));
        assert!(protocol.mailbox().unwrap().read_only);
        assert!(protocol.check(&Command::Expunge, None).is_err());
    }

    #[test]
    fn expunge_bumps_epoch_and_count() {
        let mut protocol = logged_in();
        select(&mut protocol, "INBOX", &[b"* 5 EXISTS\r\n"], None);
        protocol.observe(&untagged(b"* 2 EXPUNGE\r\n"));
        protocol.observe(&untagged(b"* 2 EXPUNGE\r\n"));
        assert_eq!(protocol.epoch(), 2);
        assert_eq!(protocol.mailbox().unwrap().exists, 3);
    }

    #[test]
    fn stale_selection_is_rejected() {
        let mut protocol = logged_in();
        select(&mut protocol, "INBOX", &[], None);
        let first = protocol.selection();
        select(&mut protocol, "Archive", &[], None);
        let fetch = Command::Close;
        assert!(matches!(
            protocol.check(&fetch, Some(first)),
            Err(Error::InvalidState { .. })
        ));
        assert!(protocol.check(&fetch, Some(protocol.selection())).is_ok());
    }

    #[test]
    fn failed_select_leaves_selected_state() {
        let mut protocol = logged_in();
        select(&mut protocol, "INBOX", &[], None);
        let command = Command::Select {
            mailbox: Mailbox::new("Missing"),
        };
        protocol.begin(&command);
        protocol.complete(&command, Status::No, Some(&ResponseCode::NonExistent));
        assert_eq!(protocol.state(), &ProtocolState::Authenticated);
        assert!(protocol.mailbox().is_none());
        assert_eq!(protocol.selection(), 2);
    }

    #[test]
    fn deleting_selected_mailbox_invalidates_selection() {
        let mut protocol = logged_in();
        select(&mut protocol, "Work", &[], None);
        let before = protocol.selection();
        protocol.complete(
            &Command::Delete {
                mailbox: Mailbox::new("Other"),
            },
            Status::Ok,
            None,
        );
        assert_eq!(protocol.selection(), before);
        protocol.complete(
            &Command::Rename {
                from: Mailbox::new("Work"),
                to: Mailbox::new("Work-2024"),
            },
            Status::Ok,
            None,
        );
        assert_eq!(protocol.selection(), before + 1);
    }

    #[test]
    fn capability_code_on_login_completion() {
        let mut protocol = Protocol::new();
        protocol
            .greet(&ResponseParser::parse(b"* OK ready\r\n").unwrap())
            .unwrap();
        let login = Command::Login {
            username: "u".into(),
            password: "p".into(),
        };
        protocol.complete(
            &login,
            Status::Ok,
            Some(&ResponseCode::Capability(vec![Capability::Imap4Rev1, Capability::Sort])),
        );
        assert_eq!(protocol.state(), &ProtocolState::Authenticated);
        assert!(protocol.has_capability(&Capability::Sort));
    }

    #[test]
    fn bye_moves_to_logout() {
        let mut protocol = logged_in();
        protocol.observe(&untagged(b"* BYE idle timeout\r\n"));
        assert_eq!(protocol.state(), &ProtocolState::Logout);
        assert!(protocol.check(&Command::Noop, None).is_err());
    }

    #[test]
    fn command_result_conversion() {
        let result = CommandResult {
            status: Status::No,
            code: Some(ResponseCode::NoPerm),
            text: "denied".into(),
            responses: vec![],
        };
        assert!(matches!(
            result.into_result(),
            Err(Error::Rejected {
                status: Status::No,
                code: Some(ResponseCode::NoPerm),
                ..
            })
        ));
    }
}
