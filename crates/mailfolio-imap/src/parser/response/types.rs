//! Response data types.

use crate::types::{
    Capability, Flags, ListResponse, Mailbox, ResponseCode, SeqNum, Uid, UidValidity,
};

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `FLAGS`
    Flags(Flags),
    /// `INTERNALDATE`, as sent.
    InternalDate(String),
    /// `RFC822.SIZE`
    Rfc822Size(u32),
    /// `ENVELOPE`
    Envelope(Box<Envelope>),
    /// `UID`
    Uid(Uid),
    /// `BODY[section]<origin>`
    Body {
        /// Section text between the brackets, `None` when empty.
        section: Option<String>,
        /// Origin octet of a partial fetch.
        origin: Option<u32>,
        /// Data; `None` when the server answered NIL.
        data: Option<Vec<u8>>,
    },
    /// `BODYSTRUCTURE` or `BODY` without a section.
    BodyStructure(BodyStructure),
}

impl FetchItem {
    /// Key the item is reported under, matching
    /// [`FetchAttribute::response_key`](crate::command::FetchAttribute::response_key).
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Flags(_) => "FLAGS".to_string(),
            Self::InternalDate(_) => "INTERNALDATE".to_string(),
            Self::Rfc822Size(_) => "RFC822.SIZE".to_string(),
            Self::Envelope(_) => "ENVELOPE".to_string(),
            Self::Uid(_) => "UID".to_string(),
            Self::Body { section, .. } => {
                format!("BODY[{}]", section.as_deref().unwrap_or_default())
            }
            Self::BodyStructure(_) => "BODYSTRUCTURE".to_string(),
        }
    }
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Envelope address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route.
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// `local@domain`, when both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// MIME structure of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Non-text leaf part.
    Basic {
        /// Media type, upper case.
        media_type: String,
        /// Media subtype, upper case.
        media_subtype: String,
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Content-ID.
        id: Option<String>,
        /// Content-Description.
        description: Option<String>,
        /// Content-Transfer-Encoding.
        encoding: String,
        /// Size in octets.
        size: u32,
    },
    /// `TEXT/*` leaf part.
    Text {
        /// Subtype, upper case.
        subtype: String,
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Content-ID.
        id: Option<String>,
        /// Content-Description.
        description: Option<String>,
        /// Content-Transfer-Encoding.
        encoding: String,
        /// Size in octets.
        size: u32,
        /// Size in lines.
        lines: u32,
    },
    /// Multipart container.
    Multipart {
        /// Child parts.
        bodies: Vec<Self>,
        /// Subtype, upper case.
        subtype: String,
    },
}

impl BodyStructure {
    /// Number of leaf parts.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Multipart { bodies, .. } => bodies.iter().map(Self::leaf_count).sum(),
            Self::Basic { .. } | Self::Text { .. } => 1,
        }
    }
}

/// STATUS response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// Number of messages.
    Messages(u32),
    /// Number of recent messages.
    Recent(u32),
    /// Next UID.
    UidNext(Uid),
    /// UID validity.
    UidValidity(UidValidity),
    /// Number of unseen messages.
    Unseen(u32),
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO`
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH`
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY`
    Capability(Vec<Capability>),
    /// `* LIST`
    List(ListResponse),
    /// `* LSUB`
    Lsub(ListResponse),
    /// `* FLAGS`
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// `* SEARCH`: sequence numbers or UIDs, depending on the command.
    Search(Vec<u32>),
    /// `* SORT`: numbers in sorted order.
    Sort(Vec<u32>),
    /// `* STATUS`
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items.
        items: Vec<StatusItem>,
    },
    /// Any other untagged data, kept verbatim.
    Other {
        /// Upper-cased keyword.
        keyword: String,
        /// Rest of the line.
        text: String,
    },
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
    fn address_email() {
        let mut addr = Address {
            name: Some("Jane".to_string()),
            adl: None,
            mailbox: Some("jane".to_string()),
            host: Some("example.com".to_string()),
        };
        assert_eq!(addr.email(), Some("jane@example.com".to_string()));
        addr.host = None;
        assert_eq!(addr.email(), None);
    }

    #[test]
    fn fetch_item_keys() {
        let body = FetchItem::Body {
            section: Some("HEADER".to_string()),
            origin: None,
            data: None,
        };
        assert_eq!(body.key(), "BODY[HEADER]");
        assert_eq!(FetchItem::Rfc822Size(1).key(), "RFC822.SIZE");
    }

    #[test]
    fn leaf_count_recurses() {
        let text = BodyStructure::Text {
            subtype: "PLAIN".to_string(),
            params: vec![],
            id: None,
            description: None,
            encoding: "7BIT".to_string(),
            size: 10,
            lines: 1,
        };
        let nested = BodyStructure::Multipart {
            bodies: vec![
                text.clone(),
                BodyStructure::Multipart {
                    bodies: vec![text.clone(), text],
                    subtype: "ALTERNATIVE".to_string(),
                },
            ],
            subtype: "MIXED".to_string(),
        };
        assert_eq!(nested.leaf_count(), 3);
    }
}
