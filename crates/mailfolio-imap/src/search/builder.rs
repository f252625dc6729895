//! Fluent construction of predicate trees.

use chrono::NaiveDate;

use crate::types::SequenceSet;

use super::predicate::{Predicate, SearchKey};

/// Builds a [`Predicate`]. Terms added in sequence are ANDed.
///
/// ```
/// use mailfolio_imap::search::SearchBuilder;
///
/// let predicate = SearchBuilder::new()
///     .unseen()
///     .or(|b| b.from("alice@example.com"), |b| b.from("bob@example.com"))
///     .not(|b| b.deleted())
///     .build();
/// assert_eq!(predicate.leaf_count(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchBuilder {
    terms: Vec<Predicate>,
}

macro_rules! flag_terms {
    ($($name:ident => $key:ident),* $(,)?) => {
        $(
            #[doc = concat!("Adds `", stringify!($key), "`.")]
            #[must_use]
            pub fn $name(self) -> Self {
                self.key(SearchKey::$key)
            }
        )*
    };
}

macro_rules! string_terms {
    ($($name:ident => $key:ident),* $(,)?) => {
        $(
            #[doc = concat!("Adds `", stringify!($key), "` with a search string.")]
            #[must_use]
            pub fn $name(self, text: impl Into<String>) -> Self {
                self.key(SearchKey::$key(text.into()))
            }
        )*
    };
}

macro_rules! date_terms {
    ($($name:ident => $key:ident),* $(,)?) => {
        $(
            #[doc = concat!("Adds `", stringify!($key), "` with a date.")]
            #[must_use]
            pub fn $name(self, date: NaiveDate) -> Self {
                self.key(SearchKey::$key(date))
            }
        )*
    };
}

impl SearchBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Adds a key.
    #[must_use]
    pub fn key(mut self, key: SearchKey) -> Self {
        self.terms.push(Predicate::Key(key));
        self
    }

    /// Adds an already built predicate.
    #[must_use]
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.terms.push(predicate);
        self
    }

    flag_terms! {
        all => All,
        answered => Answered,
        deleted => Deleted,
        draft => Draft,
        flagged => Flagged,
        new_messages => New,
        old => Old,
        recent => Recent,
        seen => Seen,
        unanswered => Unanswered,
        undeleted => Undeleted,
        undraft => Undraft,
        unflagged => Unflagged,
        unseen => Unseen,
    }

    string_terms! {
        keyword => Keyword,
        unkeyword => Unkeyword,
        bcc => Bcc,
        body => Body,
        cc => Cc,
        from => From,
        subject => Subject,
        text => Text,
        to => To,
    }

    date_terms! {
        before => Before,
        on => On,
        since => Since,
        sent_before => SentBefore,
        sent_on => SentOn,
        sent_since => SentSince,
    }

    /// Adds `HEADER name value`.
    #[must_use]
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.key(SearchKey::Header(name.into(), value.into()))
    }

    /// Adds `LARGER n`.
    #[must_use]
    pub fn larger(self, octets: u32) -> Self {
        self.key(SearchKey::Larger(octets))
    }

    /// Adds `SMALLER n`.
    #[must_use]
    pub fn smaller(self, octets: u32) -> Self {
        self.key(SearchKey::Smaller(octets))
    }

    /// Adds `UID set`.
    #[must_use]
    pub fn uid(self, set: SequenceSet) -> Self {
        self.key(SearchKey::Uid(set))
    }

    /// Adds a sequence set.
    #[must_use]
    pub fn sequence(self, set: SequenceSet) -> Self {
        self.key(SearchKey::Sequence(set))
    }

    /// Adds `OR left right`, each side built by its own closure.
    #[must_use]
    pub fn or(
        mut self,
        left: impl FnOnce(Self) -> Self,
        right: impl FnOnce(Self) -> Self,
    ) -> Self {
        let left = left(Self::new()).build();
        let right = right(Self::new()).build();
        self.terms.push(Predicate::or(left, right));
        self
    }

    /// Adds `NOT operand`, the operand built by the closure.
    #[must_use]
    pub fn not(mut self, operand: impl FnOnce(Self) -> Self) -> Self {
        let operand = operand(Self::new()).build();
        self.terms.push(Predicate::negate(operand));
        self
    }

    /// Finishes the tree. A single term is returned as-is, anything else as
    /// an AND (empty when nothing was added).
    #[must_use]
    pub fn build(mut self) -> Predicate {
        if self.terms.len() == 1 {
            self.terms.remove(0)
        } else {
            Predicate::And(self.terms)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn single_term_is_not_wrapped() {
        assert_eq!(
            SearchBuilder::new().unseen().build(),
            Predicate::Key(SearchKey::Unseen)
        );
    }

    #[test]
    fn empty_builder_has_no_leaves() {
        assert_eq!(SearchBuilder::new().build().leaf_count(), 0);
    }

    #[test]
    fn nested_combinators() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let p = SearchBuilder::new()
            .since(date)
            .or(|b| b.flagged().larger(1000), |b| b.subject("urgent"))
            .not(|b| b.seen())
            .build();
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::Key(SearchKey::Since(date)),
                Predicate::or(
                    Predicate::And(vec![
                        Predicate::Key(SearchKey::Flagged),
                        Predicate::Key(SearchKey::Larger(1000)),
                    ]),
                    Predicate::Key(SearchKey::Subject("urgent".into())),
                ),
                Predicate::negate(Predicate::Key(SearchKey::Seen)),
            ])
        );
    }
}
