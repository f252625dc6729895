//! Message records assembled from FETCH responses.

use std::collections::BTreeMap;

use crate::parser::{BodyStructure, Envelope};
use crate::types::{Flags, SeqNum, Uid};
use crate::{Error, Result};

/// State of one attribute in a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    /// The attribute was not part of the fetch.
    #[default]
    NotRequested,
    /// Requested, but the server did not return it.
    Missing,
    /// Returned by the server.
    Present(T),
}

impl<T> Field<T> {
    /// Returns true if the server returned the attribute.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns true if the attribute was requested and omitted.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Converts into a result, naming `attribute` in the error.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn get(&self, attribute: &str, seq: SeqNum) -> Result<&T> {
        match self {
            Self::Present(value) => Ok(value),
            Self::NotRequested => Err(Error::NotFetched {
                attribute: attribute.to_string(),
            }),
            Self::Missing => Err(Error::PartialFetch {
                seq: seq.get(),
                attribute: attribute.to_string(),
            }),
        }
    }
}

/// One message as returned by a folder operation.
///
/// The sequence number is only meaningful while the folder's epoch equals
/// [`epoch`](Self::epoch); the UID identifies the message across calls.
/// Attribute accessors fail with [`Error::NotFetched`] when the attribute
/// was not requested and with [`Error::PartialFetch`] when the server left it
/// out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub(crate) seq: SeqNum,
    pub(crate) uid: Field<Uid>,
    pub(crate) flags: Field<Flags>,
    pub(crate) envelope: Field<Box<Envelope>>,
    pub(crate) body_structure: Field<BodyStructure>,
    pub(crate) internal_date: Field<String>,
    pub(crate) size: Field<u32>,
    pub(crate) headers: Field<Vec<u8>>,
    /// Body sections keyed by upper-cased section text.
    pub(crate) sections: BTreeMap<String, Field<Vec<u8>>>,
    pub(crate) selection: u64,
    pub(crate) epoch: u64,
    pub(crate) expunged: bool,
}

impl MessageRecord {
    pub(crate) fn new(seq: SeqNum, selection: u64, epoch: u64) -> Self {
        Self {
            seq,
            uid: Field::NotRequested,
            flags: Field::NotRequested,
            envelope: Field::NotRequested,
            body_structure: Field::NotRequested,
            internal_date: Field::NotRequested,
            size: Field::NotRequested,
            headers: Field::NotRequested,
            sections: BTreeMap::new(),
            selection,
            epoch,
            expunged: false,
        }
    }

    /// Sequence number at the time of the fetch.
    #[must_use]
    pub const fn seq(&self) -> SeqNum {
        self.seq
    }

    /// Unique identifier.
    ///
    /// # Errors
    ///
    /// [`Error::PartialFetch`] if the server did not return the UID.
    pub fn uid(&self) -> Result<Uid> {
        self.uid.get("UID", self.seq).copied()
    }

    /// Flags at the time of the fetch.
    ///
    /// # Errors
    ///
    /// [`Error::PartialFetch`] if the server did not return FLAGS.
    pub fn flags(&self) -> Result<&Flags> {
        self.flags.get("FLAGS", self.seq)
    }

    /// Envelope.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn envelope(&self) -> Result<&Envelope> {
        self.envelope.get("ENVELOPE", self.seq).map(|e| &**e)
    }

    /// MIME structure.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn body_structure(&self) -> Result<&BodyStructure> {
        self.body_structure.get("BODYSTRUCTURE", self.seq)
    }

    /// Internal date, as sent by the server.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn internal_date(&self) -> Result<&str> {
        self.internal_date
            .get("INTERNALDATE", self.seq)
            .map(String::as_str)
    }

    /// Size in octets.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn size(&self) -> Result<u32> {
        self.size.get("RFC822.SIZE", self.seq).copied()
    }

    /// Raw bytes of the requested header fields, unparsed.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn headers(&self) -> Result<&[u8]> {
        self.headers
            .get("BODY[HEADER.FIELDS]", self.seq)
            .map(Vec::as_slice)
    }

    /// Raw bytes of a body section; `""` is the whole message.
    ///
    /// # Errors
    ///
    /// [`Error::NotFetched`] or [`Error::PartialFetch`].
    pub fn body(&self, section: &str) -> Result<&[u8]> {
        let key = section.to_ascii_uppercase();
        let attribute = format!("BODY[{key}]");
        self.sections
            .get(&key)
            .unwrap_or(&Field::NotRequested)
            .get(&attribute, self.seq)
            .map(Vec::as_slice)
    }

    /// Names of requested attributes the server omitted.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        let fixed = [
            ("UID", self.uid.is_missing()),
            ("FLAGS", self.flags.is_missing()),
            ("ENVELOPE", self.envelope.is_missing()),
            ("BODYSTRUCTURE", self.body_structure.is_missing()),
            ("INTERNALDATE", self.internal_date.is_missing()),
            ("RFC822.SIZE", self.size.is_missing()),
            ("BODY[HEADER.FIELDS]", self.headers.is_missing()),
        ];
        missing.extend(
            fixed
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| (*name).to_string()),
        );
        missing.extend(
            self.sections
                .iter()
                .filter(|(_, field)| field.is_missing())
                .map(|(key, _)| format!("BODY[{key}]")),
        );
        missing
    }

    /// One [`Error::PartialFetch`] per omitted attribute.
    #[must_use]
    pub fn partial_errors(&self) -> Vec<Error> {
        self.missing()
            .into_iter()
            .map(|attribute| Error::PartialFetch {
                seq: self.seq.get(),
                attribute,
            })
            .collect()
    }

    /// Returns true if every requested attribute was returned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Returns true if the record came from [`Folder::expunge`](crate::folder::Folder::expunge).
    #[must_use]
    pub const fn is_expunged(&self) -> bool {
        self.expunged
    }

    /// Numbering epoch the sequence number belongs to.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Selection the record was fetched under.
    #[must_use]
    pub const fn selection(&self) -> u64 {
        self.selection
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
    use super::*;

    fn record() -> MessageRecord {
        let mut record = MessageRecord::new(SeqNum::new(3).unwrap(), 1, 0);
        record.uid = Field::Present(Uid::new(42).unwrap());
        record.flags = Field::Present(Flags::new());
        record.envelope = Field::Missing;
        record
            .sections
            .insert("TEXT".to_string(), Field::Present(b"hello".to_vec()));
        record
    }

    #[test]
    fn accessors_distinguish_absence() {
        let record = record();
        assert_eq!(record.uid().unwrap().get(), 42);
        assert!(record.flags().unwrap().is_empty());
        assert_eq!(record.body("text").unwrap(), b"hello");

        assert!(matches!(
            record.envelope(),
            Err(Error::PartialFetch { seq: 3, ref attribute }) if attribute == "ENVELOPE"
        ));
        assert!(matches!(record.size(), Err(Error::NotFetched { .. })));
        assert!(matches!(record.body("1.2"), Err(Error::NotFetched { .. })));
    }

    #[test]
    fn missing_lists_omitted_attributes() {
        let mut record = record();
        record.sections.insert("1".to_string(), Field::Missing);
        assert_eq!(record.missing(), vec!["ENVELOPE", "BODY[1]"]);
        assert_eq!(record.partial_errors().len(), 2);
        assert!(!record.is_complete());
    }
}
