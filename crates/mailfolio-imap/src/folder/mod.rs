//! Folder sessions: the operations on one selected mailbox.
//!
//! A [`Folder`] is created by [`Connection::select`] or
//! [`Connection::examine`] and remembers the selection id it was opened
//! under. Every command it sends carries that id, so once another mailbox is
//! selected, or the mailbox is closed, renamed or deleted, the folder's
//! operations fail with [`Error::InvalidState`] before anything is written.
//!
//! Messages are identified by UID between calls. Sequence numbers in a
//! [`MessageRecord`] are only meaningful for the numbering epoch recorded in
//! it; see [`Folder::expunge`].

use tracing::info;

use crate::command::{Command, StoreAction};
use crate::connection::Connection;
use crate::fetch::{FetchPlan, IdKind, MessageRecord, PrefetchItem, PrefetchProfile};
use crate::parser::UntaggedResponse;
use crate::protocol::{CommandResult, ConnectionSnapshot, StateRequirement};
use crate::search::{compile, Predicate, SearchKey, SortSpec};
use crate::types::{Capability, Mailbox, MailboxStatus, ResponseCode, Status, UidValidity};
use crate::{Error, Result};

/// How a mailbox is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// SELECT: flags may be changed and messages expunged.
    #[default]
    ReadWrite,
    /// EXAMINE, or SELECT answered with `[READ-ONLY]`.
    ReadOnly,
}

/// Message counts of the selected mailbox.
///
/// Advisory: another client may change the mailbox right after the counts
/// were taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounts {
    /// Messages in the mailbox.
    pub total: u32,
    /// Messages without `\Seen`.
    pub unread: u32,
    /// Messages with `\Recent`.
    pub new: u32,
}

/// Session on one selected mailbox.
#[derive(Debug)]
pub struct Folder {
    conn: Connection,
    mailbox: Mailbox,
    mode: AccessMode,
    selection: u64,
    status: MailboxStatus,
    profile: PrefetchProfile,
}

impl Folder {
    /// Selects `mailbox` on `conn`, with SELECT or EXAMINE depending on
    /// `mode`.
    ///
    /// A read-write request the server answers with `[READ-ONLY]` opens the
    /// folder read-only; check [`mode`](Self::mode).
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchMailbox`] for a NO with `[NONEXISTENT]` or `[TRYCREATE]`
    /// - [`Error::Permission`] for a NO with `[NOPERM]`
    /// - [`Error::Rejected`] for any other NO or BAD
    /// - [`Error::InvalidState`] if the connection is not authenticated
    pub async fn select(
        conn: &Connection,
        mailbox: impl Into<Mailbox>,
        mode: AccessMode,
    ) -> Result<Self> {
        let mailbox = mailbox.into();
        let command = match mode {
            AccessMode::ReadWrite => Command::Select {
                mailbox: mailbox.clone(),
            },
            AccessMode::ReadOnly => Command::Examine {
                mailbox: mailbox.clone(),
            },
        };

        let (_, snapshot) = conn
            .submit(command, None)
            .await
            .map_err(|err| select_error(err, &mailbox))?;

        let read_only = snapshot
            .state
            .selected()
            .is_none_or(|selected| selected.read_only);
        let mode = if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let status = snapshot.mailbox.unwrap_or_default();
        info!(
            mailbox = %mailbox,
            exists = status.exists,
            read_only,
            "selected mailbox"
        );

        Ok(Self {
            conn: conn.clone(),
            mailbox,
            mode,
            selection: snapshot.selection,
            status,
            profile: PrefetchProfile::new(),
        })
    }

    /// Name of the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Access mode the mailbox was opened with.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// UIDVALIDITY reported when the mailbox was selected.
    #[must_use]
    pub const fn uid_validity(&self) -> Option<UidValidity> {
        self.status.uid_validity
    }

    /// The active pre-fetch profile.
    #[must_use]
    pub const fn profile(&self) -> &PrefetchProfile {
        &self.profile
    }

    /// Returns true while the connection is usable and this folder's mailbox
    /// is still the selected one.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let snapshot = self.conn.snapshot();
        snapshot.usable && snapshot.selection == self.selection && snapshot.state.is_selected()
    }

    /// Replaces the pre-fetch profile.
    pub fn set_prefetch_profile(&mut self, profile: PrefetchProfile) {
        self.profile = profile;
    }

    /// Replaces the pre-fetch profile with one holding exactly `items`.
    ///
    /// The previous profile is discarded, not extended; use
    /// [`PrefetchProfile::with`] on [`profile`](Self::profile) to extend it.
    pub fn add_prefetch_items(&mut self, items: impl IntoIterator<Item = PrefetchItem>) {
        self.profile = items.into_iter().collect();
    }

    /// Searches the mailbox and fetches the matches per the active profile.
    ///
    /// Without `sort` (or with an empty one) records come in ascending
    /// order; with a sort program they come in the order the server sorted
    /// them. Matching runs on UIDs so that an expunge reported mid-way cannot
    /// shift the result.
    ///
    /// If the profile fetches body sections without PEEK, the server marks
    /// the matches `\Seen`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyPredicate`] for a predicate without keys
    /// - [`Error::InvalidKeyword`] for a KEYWORD or UNKEYWORD that is not an atom
    /// - [`Error::Unsupported`] when sorting on a server without `SORT`
    /// - [`Error::Rejected`] when the server refuses the search
    /// - [`Error::InvalidState`] once the folder is no longer selected
    pub async fn search(
        &self,
        predicate: &Predicate,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<MessageRecord>> {
        let command = compile(predicate, sort, true)?;
        if matches!(command, Command::Sort { .. }) && !self.conn.has_capability(&Capability::Sort)
        {
            return Err(Error::Unsupported("SORT".to_string()));
        }

        let (result, _) = self.submit(command).await?;
        let uids = found_ids(&result);
        self.fetch(&uids, IdKind::Uid, true).await
    }

    /// Fetches messages `low..=high` by sequence number, in ascending order.
    ///
    /// Exactly `high - low + 1` records are returned; messages the server
    /// did not report have every attribute marked missing. Without
    /// `prefetch` only UID and FLAGS are fetched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRange`] if `low` is zero, `low > high`, or `high`
    ///   exceeds the current message count
    /// - [`Error::InvalidState`] once the folder is no longer selected
    pub async fn fetch_range(
        &self,
        low: u32,
        high: u32,
        prefetch: bool,
    ) -> Result<Vec<MessageRecord>> {
        let snapshot = self.current()?;
        let exists = snapshot.mailbox.as_ref().map_or(0, |status| status.exists);
        if low == 0 || low > high || high > exists {
            return Err(Error::InvalidRange { low, high, exists });
        }

        let ids: Vec<u32> = (low..=high).collect();
        self.fetch(&ids, IdKind::Sequence, prefetch).await
    }

    /// Fetches the current state of `record`'s message by UID, using the
    /// active profile.
    ///
    /// Returns `None` if the message has been expunged.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`] if `record` has no
    /// UID, plus the errors of any folder command.
    pub async fn refresh(&self, record: &MessageRecord) -> Result<Option<MessageRecord>> {
        let uid = record.uid()?;
        let mut records = self.fetch(&[uid.get()], IdKind::Uid, true).await?;
        Ok(records.pop())
    }

    /// Fetches `items` for `record`'s message, regardless of the active
    /// profile, and returns them in a new record.
    ///
    /// Returns `None` if the message has been expunged.
    ///
    /// # Errors
    ///
    /// As [`refresh`](Self::refresh).
    pub async fn fetch_attributes(
        &self,
        record: &MessageRecord,
        items: impl IntoIterator<Item = PrefetchItem>,
    ) -> Result<Option<MessageRecord>> {
        let uid = record.uid()?;
        let profile: PrefetchProfile = items.into_iter().collect();
        let plan = FetchPlan::new(&profile, true);
        let mut records = self.run_plan(&plan, &[uid.get()], IdKind::Uid).await?;
        Ok(records.pop())
    }

    /// Changes the flags of `records` with UID STORE and returns records
    /// carrying the new flags. Messages expunged meanwhile are left out.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] on a read-only folder, plus the errors of any
    /// folder command.
    pub async fn store_flags(
        &self,
        records: &[MessageRecord],
        action: StoreAction,
    ) -> Result<Vec<MessageRecord>> {
        self.require_writable()?;
        let uids = records
            .iter()
            .map(|record| record.uid().map(|uid| uid.get()))
            .collect::<Result<Vec<_>>>()?;

        let plan = FetchPlan::new(&PrefetchProfile::new(), false);
        let mut responses = Vec::new();
        let mut last = None;
        for sequence in FetchPlan::batches(&uids, self.conn.config().fetch_batch_size) {
            let command = Command::Store {
                sequence,
                action: action.clone(),
                uid: true,
                silent: false,
            };
            let (result, snapshot) = self.submit(command).await?;
            responses.extend(result.responses);
            last = Some(snapshot);
        }
        let Some(snapshot) = last else {
            return Ok(Vec::new());
        };
        Ok(plan.assemble(&uids, IdKind::Uid, responses, self.selection, snapshot.epoch))
    }

    /// Permanently removes the messages flagged `\Deleted` and returns them,
    /// fetched per the active profile and marked expunged.
    ///
    /// Every record fetched before the call belongs to an older numbering
    /// epoch afterwards; identify messages by UID from then on.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] on a read-only folder, plus the errors of any
    /// folder command.
    pub async fn expunge(&self) -> Result<Vec<MessageRecord>> {
        self.require_writable()?;
        let deleted = Command::Search {
            charset: None,
            criteria: Predicate::Key(SearchKey::Deleted),
            uid: true,
        };
        let (result, _) = self.submit(deleted).await?;
        let uids = found_ids(&result);
        let mut records = self.fetch(&uids, IdKind::Uid, true).await?;

        let (result, snapshot) = self.submit(Command::Expunge).await?;
        let reported = result
            .responses
            .iter()
            .filter(|response| matches!(response, UntaggedResponse::Expunge(_)))
            .count();

        // Sequence numbers from the fetch may have shifted under unsolicited
        // EXPUNGEs, so removal is confirmed by UID.
        let candidates: Vec<u32> = records
            .iter()
            .filter_map(|record| record.uid().ok().map(|uid| uid.get()))
            .collect();
        let survivors = self.surviving_uids(&candidates).await?;
        records.retain(|record| {
            record
                .uid()
                .is_ok_and(|uid| survivors.binary_search(&uid.get()).is_err())
        });
        for record in &mut records {
            record.expunged = true;
        }
        info!(
            mailbox = %self.mailbox,
            removed = records.len(),
            reported,
            epoch = snapshot.epoch,
            "expunged"
        );
        Ok(records)
    }

    /// Message counts: total and recent from the selection state, unread
    /// from `SEARCH UNSEEN`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] once the folder is no longer selected, plus
    /// command errors.
    pub async fn counts(&self) -> Result<MessageCounts> {
        let unseen = Command::Search {
            charset: None,
            criteria: Predicate::Key(SearchKey::Unseen),
            uid: false,
        };
        let (result, snapshot) = self.submit(unseen).await?;
        let unread = u32::try_from(found_ids(&result).len()).unwrap_or(u32::MAX);
        let status = snapshot.mailbox.unwrap_or_default();
        Ok(MessageCounts {
            total: status.exists,
            unread,
            new: status.recent,
        })
    }

    /// Releases the mailbox.
    ///
    /// With `expunge`, or on a read-only folder, CLOSE is sent; CLOSE on a
    /// read-only mailbox removes nothing. Otherwise the mailbox is released
    /// without expunging: UNSELECT when the server has it, else an EXAMINE
    /// of the same mailbox followed by CLOSE.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the folder is no longer selected, plus
    /// command errors.
    pub async fn close(self, expunge: bool) -> Result<()> {
        if expunge || self.mode == AccessMode::ReadOnly {
            self.submit(Command::Close).await?;
        } else if self.conn.has_capability(&Capability::Unselect) {
            self.submit(Command::Unselect).await?;
        } else {
            let examine = Command::Examine {
                mailbox: self.mailbox.clone(),
            };
            let (_, snapshot) = self.submit(examine).await?;
            self.conn
                .submit(Command::Close, Some(snapshot.selection))
                .await?;
        }
        info!(mailbox = %self.mailbox, expunge, "closed mailbox");
        Ok(())
    }

    async fn fetch(&self, ids: &[u32], kind: IdKind, prefetch: bool) -> Result<Vec<MessageRecord>> {
        let plan = FetchPlan::new(&self.profile, prefetch);
        self.run_plan(&plan, ids, kind).await
    }

    async fn run_plan(
        &self,
        plan: &FetchPlan,
        ids: &[u32],
        kind: IdKind,
    ) -> Result<Vec<MessageRecord>> {
        let mut responses = Vec::new();
        let mut epoch = None;
        for command in plan.commands(ids, kind, self.conn.config().fetch_batch_size) {
            let (result, snapshot) = self.submit(command).await?;
            responses.extend(result.responses);
            epoch = Some(snapshot.epoch);
        }
        let Some(epoch) = epoch else {
            self.current()?;
            return Ok(Vec::new());
        };
        Ok(plan.assemble(ids, kind, responses, self.selection, epoch))
    }

    /// The subset of `uids` still present in the mailbox, sorted.
    async fn surviving_uids(&self, uids: &[u32]) -> Result<Vec<u32>> {
        let mut survivors = Vec::new();
        for set in FetchPlan::batches(uids, self.conn.config().fetch_batch_size) {
            let search = Command::Search {
                charset: None,
                criteria: Predicate::Key(SearchKey::Uid(set)),
                uid: true,
            };
            let (result, _) = self.submit(search).await?;
            survivors.extend(found_ids(&result));
        }
        survivors.sort_unstable();
        Ok(survivors)
    }

    async fn submit(&self, command: Command) -> Result<(CommandResult, ConnectionSnapshot)> {
        self.conn.submit(command, Some(self.selection)).await
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode == AccessMode::ReadOnly {
            return Err(Error::InvalidState {
                required: StateRequirement::SelectedReadWrite,
                current: format!("selected ({}, read-only)", self.mailbox),
            });
        }
        Ok(())
    }

    /// The latest snapshot, if this folder is still selected.
    fn current(&self) -> Result<ConnectionSnapshot> {
        let snapshot = self.conn.snapshot();
        if !snapshot.usable {
            return Err(Error::ConnectionClosed);
        }
        if snapshot.selection != self.selection || !snapshot.state.is_selected() {
            return Err(Error::InvalidState {
                required: StateRequirement::Selected,
                current: format!("{}, selection changed", snapshot.state),
            });
        }
        Ok(snapshot)
    }
}

fn select_error(err: Error, mailbox: &Mailbox) -> Error {
    match err {
        Error::Rejected {
            status: Status::No,
            code: Some(code),
            ..
        } if code.is_missing_mailbox() => Error::NoSuchMailbox(mailbox.to_string()),
        Error::Rejected {
            status: Status::No,
            code: Some(ResponseCode::NoPerm),
            ..
        } => Error::Permission(mailbox.to_string()),
        other => other,
    }
}

/// Numbers from a SEARCH or SORT answer, in the order the server sent them.
fn found_ids(result: &CommandResult) -> Vec<u32> {
    result
        .responses
        .iter()
        .filter_map(|response| match response {
            UntaggedResponse::Search(ids) | UntaggedResponse::Sort(ids) => Some(ids),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
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
    use super::*;

    #[test]
    fn select_errors_by_code() {
        let inbox = Mailbox::new("Archive");
        let rejected = |code| Error::Rejected {
            status: Status::No,
            code,
            text: "no".into(),
        };
        assert!(matches!(
            select_error(rejected(Some(ResponseCode::NonExistent)), &inbox),
            Error::NoSuchMailbox(name) if name == "Archive"
        ));
        assert!(matches!(
            select_error(rejected(Some(ResponseCode::TryCreate)), &inbox),
            Error::NoSuchMailbox(_)
        ));
        assert!(matches!(
            select_error(rejected(Some(ResponseCode::NoPerm)), &inbox),
            Error::Permission(_)
        ));
        assert!(matches!(
            select_error(rejected(None), &inbox),
            Error::Rejected { .. }
        ));
        assert!(matches!(
            select_error(Error::ConnectionClosed, &inbox),
            Error::ConnectionClosed
        ));
    }

    #[test]
    fn found_ids_keep_server_order() {
        let result = CommandResult {
            status: Status::Ok,
            code: None,
            text: "done".into(),
            responses: vec![UntaggedResponse::Sort(vec![9, 3, 5])],
        };
        assert_eq!(found_ids(&result), vec![9, 3, 5]);
    }

    #[test]
    fn default_mode_is_read_write() {
        assert_eq!(AccessMode::default(), AccessMode::ReadWrite);
        assert_eq!(MessageCounts::default().total, 0);
    }
}
