//! Arguments of FETCH, STORE and STATUS.

use crate::types::Flag;

/// One FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `BODY[section]<partial>` or `BODY.PEEK[...]`.
    ///
    /// Without `peek` the server sets `\Seen` on every message fetched.
    Body {
        /// Section text such as `HEADER`, `1.2` or `HEADER.FIELDS (FROM)`;
        /// `None` is the whole message.
        section: Option<String>,
        /// Use `BODY.PEEK`.
        peek: bool,
        /// Byte window `(offset, length)`.
        partial: Option<(u32, u32)>,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[HEADER.FIELDS (...)]` for the given header names.
    #[must_use]
    pub fn header_fields<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names
            .iter()
            .map(|name| name.as_ref().to_ascii_uppercase())
            .collect();
        Self::Body {
            section: Some(format!("HEADER.FIELDS ({})", names.join(" "))),
            peek: true,
            partial: None,
        }
    }

    /// Key under which the server reports this item in a FETCH response.
    ///
    /// `BODY.PEEK[X]` is answered as `BODY[X]`, and partial fetches are
    /// answered with the origin only.
    #[must_use]
    pub fn response_key(&self) -> String {
        match self {
            Self::Uid => "UID".to_string(),
            Self::Flags => "FLAGS".to_string(),
            Self::InternalDate => "INTERNALDATE".to_string(),
            Self::Rfc822Size => "RFC822.SIZE".to_string(),
            Self::Envelope => "ENVELOPE".to_string(),
            Self::BodyStructure => "BODYSTRUCTURE".to_string(),
            Self::Body { section, .. } => {
                format!("BODY[{}]", section.as_deref().unwrap_or_default())
            }
        }
    }
}

/// Flag change applied by STORE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `FLAGS (...)`: replace the flag set.
    Replace(Vec<Flag>),
    /// `+FLAGS (...)`: add flags.
    Add(Vec<Flag>),
    /// `-FLAGS (...)`: remove flags.
    Remove(Vec<Flag>),
}

impl StoreAction {
    /// Data item name without the `.SILENT` suffix.
    #[must_use]
    pub const fn item_name(&self) -> &'static str {
        match self {
            Self::Replace(_) => "FLAGS",
            Self::Add(_) => "+FLAGS",
            Self::Remove(_) => "-FLAGS",
        }
    }

    /// Flags carried by the action.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        match self {
            Self::Replace(flags) | Self::Add(flags) | Self::Remove(flags) => flags,
        }
    }
}

/// STATUS data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// `MESSAGES`
    Messages,
    /// `RECENT`
    Recent,
    /// `UIDNEXT`
    UidNext,
    /// `UIDVALIDITY`
    UidValidity,
    /// `UNSEEN`
    Unseen,
}

impl StatusAttribute {
    /// Wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_section() {
        let attr = FetchAttribute::header_fields(&["Subject", "x-priority"]);
        assert_eq!(
            attr,
            FetchAttribute::Body {
                section: Some("HEADER.FIELDS (SUBJECT X-PRIORITY)".into()),
                peek: true,
                partial: None,
            }
        );
        assert_eq!(attr.response_key(), "BODY[HEADER.FIELDS (SUBJECT X-PRIORITY)]");
    }

    #[test]
    fn whole_message_response_key() {
        let attr = FetchAttribute::Body {
            section: None,
            peek: false,
            partial: None,
        };
        assert_eq!(attr.response_key(), "BODY[]");
    }

    #[test]
    fn store_item_names() {
        assert_eq!(StoreAction::Add(vec![Flag::Seen]).item_name(), "+FLAGS");
        assert_eq!(StoreAction::Replace(Vec::new()).flags(), &[] as &[Flag]);
    }
}
