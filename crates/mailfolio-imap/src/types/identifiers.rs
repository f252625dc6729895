//! Tags, sequence numbers, UIDs and UIDVALIDITY.

use std::fmt;
use std::num::NonZeroU32;

/// Command tag echoed by the server on the completion of that command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    /// Wraps a tag string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Creates the identifier, or `None` for zero.
            #[must_use]
            pub fn new(n: u32) -> Option<Self> {
                NonZeroU32::new(n).map(Self)
            }

            /// Returns the numeric value.
            #[must_use]
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.get()
            }
        }
    };
}

nonzero_id! {
    /// Message sequence number.
    ///
    /// Positions start at 1 and shift down every time a lower-numbered
    /// message is expunged, so a sequence number is only meaningful within
    /// the numbering epoch that produced it.
    SeqNum
}

nonzero_id! {
    /// Unique identifier of a message, stable for as long as the mailbox's
    /// UIDVALIDITY does not change.
    Uid
}

nonzero_id! {
    /// UIDVALIDITY of a mailbox. A change invalidates every remembered UID.
    UidValidity
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_an_identifier() {
        assert!(SeqNum::new(0).is_none());
        assert!(Uid::new(0).is_none());
        assert!(UidValidity::new(0).is_none());
    }

    #[test]
    fn identifiers_order_numerically() {
        let mut seqs: Vec<SeqNum> = [9, 2, 30].into_iter().filter_map(SeqNum::new).collect();
        seqs.sort();
        let values: Vec<u32> = seqs.into_iter().map(u32::from).collect();
        assert_eq!(values, vec![2, 9, 30]);
    }

    #[test]
    fn tag_displays_verbatim() {
        let tag = Tag::new("A0042");
        assert_eq!(tag.to_string(), "A0042");
        assert_eq!(tag.as_str(), "A0042");
    }

    #[test]
    fn uid_display() {
        assert_eq!(Uid::new(4_000_000_000).unwrap().to_string(), "4000000000");
    }
}
