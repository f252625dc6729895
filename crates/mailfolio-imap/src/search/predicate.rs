//! Search keys and the predicate tree.

use chrono::NaiveDate;

use crate::parser::lexer::is_atom_char;
use crate::types::SequenceSet;

/// One SEARCH key (RFC 3501 section 6.4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// `ALL`
    All,
    /// `ANSWERED`
    Answered,
    /// `DELETED`
    Deleted,
    /// `DRAFT`
    Draft,
    /// `FLAGGED`
    Flagged,
    /// `NEW`: recent and unseen.
    New,
    /// `OLD`: not recent.
    Old,
    /// `RECENT`
    Recent,
    /// `SEEN`
    Seen,
    /// `UNANSWERED`
    Unanswered,
    /// `UNDELETED`
    Undeleted,
    /// `UNDRAFT`
    Undraft,
    /// `UNFLAGGED`
    Unflagged,
    /// `UNSEEN`
    Unseen,
    /// `KEYWORD flag`
    Keyword(String),
    /// `UNKEYWORD flag`
    Unkeyword(String),
    /// `BCC string`
    Bcc(String),
    /// `BODY string`
    Body(String),
    /// `CC string`
    Cc(String),
    /// `FROM string`
    From(String),
    /// `SUBJECT string`
    Subject(String),
    /// `TEXT string`: header or body.
    Text(String),
    /// `TO string`
    To(String),
    /// `HEADER field-name string`
    Header(String, String),
    /// `BEFORE date`: internal date.
    Before(NaiveDate),
    /// `ON date`: internal date.
    On(NaiveDate),
    /// `SINCE date`: internal date.
    Since(NaiveDate),
    /// `SENTBEFORE date`: Date header.
    SentBefore(NaiveDate),
    /// `SENTON date`: Date header.
    SentOn(NaiveDate),
    /// `SENTSINCE date`: Date header.
    SentSince(NaiveDate),
    /// `LARGER n`
    Larger(u32),
    /// `SMALLER n`
    Smaller(u32),
    /// `UID set`
    Uid(SequenceSet),
    /// Bare sequence set.
    Sequence(SequenceSet),
}

impl SearchKey {
    /// Free-text arguments of the key.
    #[must_use]
    pub fn strings(&self) -> Vec<&str> {
        match self {
            Self::Bcc(s)
            | Self::Body(s)
            | Self::Cc(s)
            | Self::From(s)
            | Self::Subject(s)
            | Self::Text(s)
            | Self::To(s) => vec![s.as_str()],
            Self::Header(name, value) => vec![name.as_str(), value.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Immutable tree of search keys.
///
/// `And` with no children matches nothing useful and is rejected when
/// compiled; see [`compile`](super::compile).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// A single key.
    Key(SearchKey),
    /// All children match.
    And(Vec<Self>),
    /// Either side matches.
    Or(Box<Self>, Box<Self>),
    /// The operand does not match.
    Not(Box<Self>),
}

impl Predicate {
    /// `OR left right`
    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// `NOT operand`
    #[must_use]
    pub fn negate(operand: Self) -> Self {
        Self::Not(Box::new(operand))
    }

    /// Number of keys in the tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Key(_) => 1,
            Self::And(children) => children.iter().map(Self::leaf_count).sum(),
            Self::Or(left, right) => left.leaf_count() + right.leaf_count(),
            Self::Not(operand) => operand.leaf_count(),
        }
    }

    /// The first KEYWORD or UNKEYWORD argument that cannot be sent as an
    /// atom, if any.
    #[must_use]
    pub fn invalid_keyword(&self) -> Option<&str> {
        match self {
            Self::Key(SearchKey::Keyword(flag) | SearchKey::Unkeyword(flag)) => {
                (!is_keyword(flag)).then_some(flag.as_str())
            }
            Self::Key(_) => None,
            Self::And(children) => children.iter().find_map(Self::invalid_keyword),
            Self::Or(left, right) => left.invalid_keyword().or_else(|| right.invalid_keyword()),
            Self::Not(operand) => operand.invalid_keyword(),
        }
    }

    /// Returns true if an OR or NOT operand has no keys, which cannot be
    /// written on the wire.
    #[must_use]
    pub fn has_empty_operand(&self) -> bool {
        match self {
            Self::Key(_) => false,
            Self::And(children) => children.iter().any(Self::has_empty_operand),
            Self::Or(left, right) => {
                left.leaf_count() == 0
                    || right.leaf_count() == 0
                    || left.has_empty_operand()
                    || right.has_empty_operand()
            }
            Self::Not(operand) => operand.leaf_count() == 0 || operand.has_empty_operand(),
        }
    }

    /// Canonical form: nested ANDs are flattened into their parent, empty
    /// ANDs inside an AND are dropped, and a single-child AND is replaced by
    /// its child.
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::Key(key) => Self::Key(key.clone()),
            Self::And(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    match child.normalized() {
                        Self::And(grandchildren) => flat.extend(grandchildren),
                        other => flat.push(other),
                    }
                }
                if flat.len() == 1 {
                    flat.remove(0)
                } else {
                    Self::And(flat)
                }
            }
            Self::Or(left, right) => Self::or(left.normalized(), right.normalized()),
            Self::Not(operand) => Self::negate(operand.normalized()),
        }
    }

    /// Returns true if every string argument is US-ASCII.
    #[must_use]
    pub fn is_ascii(&self) -> bool {
        match self {
            Self::Key(key) => key.strings().iter().all(|s| s.is_ascii()),
            Self::And(children) => children.iter().all(Self::is_ascii),
            Self::Or(left, right) => left.is_ascii() && right.is_ascii(),
            Self::Not(operand) => operand.is_ascii(),
        }
    }
}

/// `flag-keyword` is an atom; a backslash would make it a system flag.
fn is_keyword(flag: &str) -> bool {
    !flag.is_empty() && flag.bytes().all(|b| is_atom_char(b) && b != b'\\')
}

impl From<SearchKey> for Predicate {
    fn from(key: SearchKey) -> Self {
        Self::Key(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(k: SearchKey) -> Predicate {
        Predicate::Key(k)
    }

    #[test]
    fn leaf_count_spans_combinators() {
        let p = Predicate::And(vec![
            key(SearchKey::Unseen),
            Predicate::or(key(SearchKey::From("a".into())), key(SearchKey::From("b".into()))),
            Predicate::negate(key(SearchKey::Deleted)),
        ]);
        assert_eq!(p.leaf_count(), 4);
        assert_eq!(Predicate::And(vec![]).leaf_count(), 0);
    }

    #[test]
    fn normalized_flattens_and() {
        let p = Predicate::And(vec![
            Predicate::And(vec![key(SearchKey::Seen), key(SearchKey::Flagged)]),
            Predicate::And(vec![]),
            Predicate::And(vec![key(SearchKey::Draft)]),
        ]);
        assert_eq!(
            p.normalized(),
            Predicate::And(vec![
                key(SearchKey::Seen),
                key(SearchKey::Flagged),
                key(SearchKey::Draft)
            ])
        );
        assert_eq!(
            Predicate::And(vec![key(SearchKey::Seen)]).normalized(),
            key(SearchKey::Seen)
        );
    }

    #[test]
    fn empty_operand_detection() {
        assert!(Predicate::negate(Predicate::And(vec![])).has_empty_operand());
        assert!(Predicate::or(key(SearchKey::All), Predicate::And(vec![])).has_empty_operand());
        assert!(!Predicate::negate(key(SearchKey::Seen)).has_empty_operand());
    }

    #[test]
    fn ascii_detection() {
        assert!(key(SearchKey::Subject("report".into())).is_ascii());
        assert!(!Predicate::negate(key(SearchKey::Subject("Bericht für".into()))).is_ascii());
        assert!(!key(SearchKey::Header("X-Tag".into(), "café".into())).is_ascii());
    }
}
