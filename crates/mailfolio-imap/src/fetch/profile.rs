//! Pre-fetch profiles.

use crate::command::FetchAttribute;

/// One attribute a folder fetches alongside every message it returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrefetchItem {
    /// `ENVELOPE`
    Envelope,
    /// `FLAGS`; always fetched, listing it is harmless.
    Flags,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Size,
    /// One header field. All requested names share one
    /// `BODY.PEEK[HEADER.FIELDS (...)]` item.
    Header(String),
    /// A body section such as `TEXT`, `HEADER` or `1.2`; empty for the whole
    /// message.
    Section {
        /// Section text.
        section: String,
        /// Fetch with `BODY.PEEK`, leaving `\Seen` alone.
        peek: bool,
    },
}

impl PrefetchItem {
    /// A body section fetched with `BODY.PEEK`.
    #[must_use]
    pub fn section(section: impl Into<String>) -> Self {
        Self::Section {
            section: section.into(),
            peek: true,
        }
    }

    /// A body section fetched with plain `BODY`, which sets `\Seen` on the
    /// server for every message fetched.
    #[must_use]
    pub fn section_marking_seen(section: impl Into<String>) -> Self {
        Self::Section {
            section: section.into(),
            peek: false,
        }
    }

    /// Returns true if fetching this item sets `\Seen` on the message.
    #[must_use]
    pub const fn marks_seen(&self) -> bool {
        matches!(self, Self::Section { peek: false, .. })
    }

    /// FETCH attribute for items that map one-to-one. Headers are merged by
    /// the plan and return `None`.
    pub(crate) fn attribute(&self) -> Option<FetchAttribute> {
        Some(match self {
            Self::Envelope => FetchAttribute::Envelope,
            Self::Flags => FetchAttribute::Flags,
            Self::BodyStructure => FetchAttribute::BodyStructure,
            Self::InternalDate => FetchAttribute::InternalDate,
            Self::Size => FetchAttribute::Rfc822Size,
            Self::Header(_) => return None,
            Self::Section { section, peek } => FetchAttribute::Body {
                section: (!section.is_empty()).then(|| section.to_ascii_uppercase()),
                peek: *peek,
                partial: None,
            },
        })
    }
}

/// The set of attributes a folder pre-fetches.
///
/// Items keep their insertion order; duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchProfile {
    items: Vec<PrefetchItem>,
}

impl PrefetchProfile {
    /// An empty profile: only UID and FLAGS are fetched.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Adds an item, builder style.
    #[must_use]
    pub fn with(mut self, item: PrefetchItem) -> Self {
        self.insert(item);
        self
    }

    /// Adds an item unless it is already present. Header names compare
    /// case-insensitively.
    pub fn insert(&mut self, item: PrefetchItem) {
        if !self.contains(&item) {
            self.items.push(item);
        }
    }

    /// Returns true if the profile holds `item`.
    #[must_use]
    pub fn contains(&self, item: &PrefetchItem) -> bool {
        self.items.iter().any(|have| match (have, item) {
            (PrefetchItem::Header(a), PrefetchItem::Header(b)) => a.eq_ignore_ascii_case(b),
            _ => have == item,
        })
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[PrefetchItem] {
        &self.items
    }

    /// Requested header names.
    #[must_use]
    pub fn header_names(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PrefetchItem::Header(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns true if the profile is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if fetching with this profile sets `\Seen`.
    #[must_use]
    pub fn marks_seen(&self) -> bool {
        self.items.iter().any(PrefetchItem::marks_seen)
    }
}

impl FromIterator<PrefetchItem> for PrefetchProfile {
    fn from_iter<I: IntoIterator<Item = PrefetchItem>>(iter: I) -> Self {
        let mut profile = Self::new();
        for item in iter {
            profile.insert(item);
        }
        profile
    }
}

impl Extend<PrefetchItem> for PrefetchProfile {
    fn extend<I: IntoIterator<Item = PrefetchItem>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
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
    use super::*;

    #[test]
    fn duplicates_are_ignored() {
        let profile: PrefetchProfile = [
            PrefetchItem::Envelope,
            PrefetchItem::Header("Subject".into()),
            PrefetchItem::Envelope,
            PrefetchItem::Header("SUBJECT".into()),
            PrefetchItem::Header("From".into()),
        ]
        .into_iter()
        .collect();

        assert_eq!(profile.items().len(), 3);
        assert_eq!(profile.header_names(), vec!["Subject", "From"]);
    }

    #[test]
    fn only_plain_body_marks_seen() {
        assert!(!PrefetchItem::Envelope.marks_seen());
        assert!(!PrefetchItem::section("TEXT").marks_seen());
        assert!(PrefetchItem::section_marking_seen("TEXT").marks_seen());

        let profile = PrefetchProfile::new()
            .with(PrefetchItem::Size)
            .with(PrefetchItem::section_marking_seen(""));
        assert!(profile.marks_seen());
    }

    #[test]
    fn section_attributes() {
        assert_eq!(
            PrefetchItem::section("").attribute(),
            Some(FetchAttribute::Body {
                section: None,
                peek: true,
                partial: None,
            })
        );
        assert_eq!(
            PrefetchItem::section_marking_seen("text").attribute(),
            Some(FetchAttribute::Body {
                section: Some("TEXT".into()),
                peek: false,
                partial: None,
            })
        );
        assert_eq!(PrefetchItem::Header("To".into()).attribute(), None);
    }
}
