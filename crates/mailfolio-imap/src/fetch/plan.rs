//! FETCH planning and response demultiplexing.

use std::collections::HashMap;

use tracing::warn;

use crate::command::{Command, FetchAttribute};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{SeqNum, SequenceSet};

use super::profile::PrefetchProfile;
use super::record::{Field, MessageRecord};

/// What the numbers handed to a plan identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Message sequence numbers (`FETCH`).
    Sequence,
    /// UIDs (`UID FETCH`).
    Uid,
}

/// The FETCH attributes for one profile, and how to read the answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    attributes: Vec<FetchAttribute>,
    /// Response key of the merged `HEADER.FIELDS` item.
    header_key: Option<String>,
}

impl FetchPlan {
    /// Plans the attributes for `profile`. UID and FLAGS are always fetched;
    /// without `prefetch` nothing else is.
    #[must_use]
    pub fn new(profile: &PrefetchProfile, prefetch: bool) -> Self {
        let mut attributes = vec![FetchAttribute::Uid, FetchAttribute::Flags];
        let mut header_key = None;

        if prefetch {
            for item in profile.items() {
                if let Some(attribute) = item.attribute() {
                    if !attributes.contains(&attribute) {
                        attributes.push(attribute);
                    }
                }
            }
            let names = profile.header_names();
            if !names.is_empty() {
                let headers = FetchAttribute::header_fields(&names);
                header_key = Some(headers.response_key());
                attributes.push(headers);
            }
        }

        Self {
            attributes,
            header_key,
        }
    }

    /// Attributes in the order they are requested.
    #[must_use]
    pub fn attributes(&self) -> &[FetchAttribute] {
        &self.attributes
    }

    /// Returns true if the plan fetches more than UID and FLAGS.
    #[must_use]
    pub fn prefetches(&self) -> bool {
        self.attributes.len() > 2
    }

    /// Splits `ids` into compressed sets of at most `batch_size` numbers.
    #[must_use]
    pub fn batches(ids: &[u32], batch_size: usize) -> Vec<SequenceSet> {
        let mut sorted: Vec<u32> = ids.iter().copied().filter(|&n| n != 0).collect();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
            .chunks(batch_size.max(1))
            .filter_map(|chunk| SequenceSet::compress(chunk.iter().copied()))
            .collect()
    }

    /// FETCH commands covering `ids`, one per batch.
    #[must_use]
    pub fn commands(&self, ids: &[u32], kind: IdKind, batch_size: usize) -> Vec<Command> {
        Self::batches(ids, batch_size)
            .into_iter()
            .map(|sequence| Command::Fetch {
                sequence,
                items: self.attributes.clone(),
                uid: kind == IdKind::Uid,
            })
            .collect()
    }

    /// Builds one record per id, in the order of `ids`.
    ///
    /// FETCH responses for the same message are merged. Attributes the
    /// server left out are marked missing and logged. A sequence number with
    /// no response at all still yields a record with every attribute
    /// missing; a UID with no response is dropped, since the message is
    /// gone.
    #[must_use]
    pub fn assemble(
        &self,
        ids: &[u32],
        kind: IdKind,
        responses: Vec<UntaggedResponse>,
        selection: u64,
        epoch: u64,
    ) -> Vec<MessageRecord> {
        let fetched: Vec<(SeqNum, Vec<FetchItem>)> = responses
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
                _ => None,
            })
            .collect();

        // A message's data may be split over several FETCH lines, and only
        // one of them needs to carry the UID.
        let uid_of: HashMap<u32, u32> = fetched
            .iter()
            .filter_map(|(seq, items)| uid_item(items).map(|uid| (seq.get(), uid)))
            .collect();

        let mut by_id: HashMap<u32, (SeqNum, Vec<FetchItem>)> = HashMap::new();
        for (seq, items) in fetched {
            let id = match kind {
                IdKind::Sequence => Some(seq.get()),
                IdKind::Uid => uid_item(&items).or_else(|| uid_of.get(&seq.get()).copied()),
            };
            let Some(id) = id else { continue };
            let entry = by_id.entry(id).or_insert_with(|| (seq, Vec::new()));
            entry.1.extend(items);
        }

        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            let record = match (by_id.get(&id), kind) {
                (Some((seq, items)), _) => self.build(*seq, items, selection, epoch),
                (None, IdKind::Sequence) => {
                    let Some(seq) = SeqNum::new(id) else { continue };
                    self.build(seq, &[], selection, epoch)
                }
                (None, IdKind::Uid) => {
                    warn!(uid = id, "message vanished before it could be fetched");
                    continue;
                }
            };
            if !record.is_complete() {
                warn!(
                    seq = record.seq().get(),
                    missing = ?record.missing(),
                    "server omitted requested attributes"
                );
            }
            records.push(record);
        }
        records
    }

    fn build(&self, seq: SeqNum, items: &[FetchItem], selection: u64, epoch: u64) -> MessageRecord {
        let mut record = MessageRecord::new(seq, selection, epoch);

        for attribute in &self.attributes {
            let key = normalize_key(&attribute.response_key());
            // Later responses win when a message was reported twice.
            let found = items
                .iter()
                .rev()
                .find(|item| normalize_key(&item.key()) == key);

            match attribute {
                FetchAttribute::Uid => {
                    record.uid = pick(found, |item| match item {
                        FetchItem::Uid(uid) => Some(*uid),
                        _ => None,
                    });
                }
                FetchAttribute::Flags => {
                    record.flags = pick(found, |item| match item {
                        FetchItem::Flags(flags) => Some(flags.clone()),
                        _ => None,
                    });
                }
                FetchAttribute::InternalDate => {
                    record.internal_date = pick(found, |item| match item {
                        FetchItem::InternalDate(date) => Some(date.clone()),
                        _ => None,
                    });
                }
                FetchAttribute::Rfc822Size => {
                    record.size = pick(found, |item| match item {
                        FetchItem::Rfc822Size(size) => Some(*size),
                        _ => None,
                    });
                }
                FetchAttribute::Envelope => {
                    record.envelope = pick(found, |item| match item {
                        FetchItem::Envelope(envelope) => Some(envelope.clone()),
                        _ => None,
                    });
                }
                FetchAttribute::BodyStructure => {
                    record.body_structure = pick(found, |item| match item {
                        FetchItem::BodyStructure(structure) => Some(structure.clone()),
                        _ => None,
                    });
                }
                FetchAttribute::Body { section, .. } => {
                    let field = pick(found, |item| match item {
                        FetchItem::Body { data, .. } => Some(data.clone().unwrap_or_default()),
                        _ => None,
                    });
                    if self.header_key.as_deref() == Some(attribute.response_key().as_str()) {
                        record.headers = field;
                    } else {
                        let section = section.as_deref().unwrap_or_default().to_ascii_uppercase();
                        record.sections.insert(section, field);
                    }
                }
            }
        }
        record
    }
}

impl From<&PrefetchProfile> for FetchPlan {
    fn from(profile: &PrefetchProfile) -> Self {
        Self::new(profile, true)
    }
}

fn pick<T>(found: Option<&FetchItem>, extract: impl Fn(&FetchItem) -> Option<T>) -> Field<T> {
    found.and_then(extract).map_or(Field::Missing, Field::Present)
}

/// Case-insensitive, quote-insensitive form of a response key.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|&c| c != '"')
        .map(|c| c.to_ascii_uppercase())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn uid_item(items: &[FetchItem]) -> Option<u32> {
    items.iter().find_map(|item| match item {
        FetchItem::Uid(uid) => Some(uid.get()),
        _ => None,
    })
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
    use crate::fetch::PrefetchItem;
    use crate::parser::{Response, ResponseParser};
    use crate::Error;

    fn fetch(line: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(line).unwrap() {
            Response::Untagged(data) => data,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    fn envelope_profile() -> PrefetchProfile {
        PrefetchProfile::new().with(PrefetchItem::Envelope)
    }

    #[test]
    fn uid_and_flags_are_always_planned() {
        let plan = FetchPlan::new(&PrefetchProfile::new(), true);
        assert_eq!(plan.attributes(), &[FetchAttribute::Uid, FetchAttribute::Flags]);
        assert!(!plan.prefetches());

        let plan = FetchPlan::new(&envelope_profile(), false);
        assert_eq!(plan.attributes().len(), 2);
    }

    #[test]
    fn headers_merge_into_one_item() {
        let profile = PrefetchProfile::new()
            .with(PrefetchItem::Header("Subject".into()))
            .with(PrefetchItem::Flags)
            .with(PrefetchItem::Size)
            .with(PrefetchItem::Header("From".into()));
        let plan = FetchPlan::from(&profile);
        let command = &plan.commands(&[3], IdKind::Uid, 500)[0];
        assert_eq!(
            command.serialize("A1"),
            b"A1 UID FETCH 3 (UID FLAGS RFC822.SIZE BODY.PEEK[HEADER.FIELDS (SUBJECT FROM)])\r\n"
        );
    }

    #[test]
    fn batches_compress_and_split() {
        let sets = FetchPlan::batches(&[10, 9, 1, 2, 3, 4, 5, 7, 5], 500);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].to_string(), "1:5,7,9:10");

        let ids: Vec<u32> = (1..=1200).collect();
        let sets: Vec<String> = FetchPlan::batches(&ids, 500)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(sets, vec!["1:500", "501:1000", "1001:1200"]);

        assert!(FetchPlan::batches(&[], 500).is_empty());
    }

    #[test]
    fn assemble_merges_and_orders() {
        let plan = FetchPlan::from(&envelope_profile());
        let responses = vec![
            fetch(b"* 2 FETCH (UID 20 FLAGS (\\Seen))\r\n"),
            fetch(b"* 1 FETCH (UID 10 FLAGS () ENVELOPE (NIL \"one\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n"),
            fetch(b"* 2 FETCH (ENVELOPE (NIL \"two\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n"),
        ];
        let records = plan.assemble(&[20, 10], IdKind::Uid, responses, 1, 0);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uid().unwrap().get(), 20);
        assert_eq!(records[0].seq().get(), 2);
        assert!(records[0].flags().unwrap().is_seen());
        assert_eq!(records[0].envelope().unwrap().subject.as_deref(), Some("two"));
        assert_eq!(records[1].envelope().unwrap().subject.as_deref(), Some("one"));
        assert!(records.iter().all(MessageRecord::is_complete));
    }

    #[test]
    fn uid_less_lines_join_their_message() {
        let plan = FetchPlan::from(&envelope_profile());
        let responses = vec![
            fetch(b"* 7 FETCH (ENVELOPE (NIL \"seven\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n"),
            fetch(b"* 7 FETCH (UID 70 FLAGS ())\r\n"),
            fetch(b"* 9 FETCH (FLAGS (\\Seen))\r\n"),
        ];
        let records = plan.assemble(&[70], IdKind::Uid, responses, 1, 0);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq().get(), 7);
        assert_eq!(records[0].envelope().unwrap().subject.as_deref(), Some("seven"));
        assert!(records[0].is_complete());
    }

    #[test]
    fn assemble_marks_omitted_attributes() {
        let plan = FetchPlan::from(&envelope_profile());
        let responses = vec![
            fetch(b"* 1 FETCH (UID 10 FLAGS () ENVELOPE (NIL \"one\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n"),
            fetch(b"* 2 FETCH (UID 11 FLAGS ())\r\n"),
        ];
        let records = plan.assemble(&[1, 2, 3], IdKind::Sequence, responses, 1, 0);

        assert_eq!(records.len(), 3);
        assert!(records[0].is_complete());
        assert!(matches!(
            records[1].envelope(),
            Err(Error::PartialFetch { seq: 2, .. })
        ));
        assert_eq!(records[2].seq().get(), 3);
        assert_eq!(records[2].missing(), vec!["UID", "FLAGS", "ENVELOPE"]);
        assert!(matches!(records[0].size(), Err(Error::NotFetched { .. })));
    }

    #[test]
    fn vanished_uids_are_dropped() {
        let plan = FetchPlan::new(&PrefetchProfile::new(), false);
        let responses = vec![fetch(b"* 4 FETCH (UID 40 FLAGS ())\r\n")];
        let records = plan.assemble(&[40, 41], IdKind::Uid, responses, 1, 0);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn header_and_body_sections_land_in_place() {
        let profile = PrefetchProfile::new()
            .with(PrefetchItem::Header("Subject".into()))
            .with(PrefetchItem::section("text"));
        let plan = FetchPlan::from(&profile);
        let responses = vec![fetch(
            b"* 1 FETCH (UID 5 FLAGS () BODY[HEADER.FIELDS (\"SUBJECT\")] {13}\r\nSubject: hi\r\n BODY[TEXT] \"body\")\r\n",
        )];
        let records = plan.assemble(&[5], IdKind::Uid, responses, 1, 0);
        assert_eq!(records[0].headers().unwrap(), b"Subject: hi\r\n");
        assert_eq!(records[0].body("TEXT").unwrap(), b"body");
    }
}
