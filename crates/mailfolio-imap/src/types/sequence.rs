//! Sequence sets (`1:5,7,9:*`) for sequence-number and UID commands.

use std::fmt;

/// A set of message numbers as written on the wire.
///
/// The same syntax carries sequence numbers in `FETCH`/`STORE` and UIDs in
/// the `UID` forms of those commands; the command decides the meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// A single number.
    Single(u32),
    /// An inclusive range.
    Range(u32, u32),
    /// From a number to the last message (`n:*`).
    RangeFrom(u32),
    /// The last message (`*`).
    Last,
    /// Comma-separated members.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// A single message number, or `None` for zero.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        (n != 0).then_some(Self::Single(n))
    }

    /// An inclusive range, or `None` if either bound is zero or `low > high`.
    #[must_use]
    pub fn range(low: u32, high: u32) -> Option<Self> {
        if low == 0 || low > high {
            return None;
        }
        Some(if low == high {
            Self::Single(low)
        } else {
            Self::Range(low, high)
        })
    }

    /// Builds the shortest set covering exactly the given numbers.
    ///
    /// Numbers are sorted and deduplicated, then consecutive runs collapse
    /// into ranges. Returns `None` when no non-zero number is given.
    #[must_use]
    pub fn compress(numbers: impl IntoIterator<Item = u32>) -> Option<Self> {
        let mut sorted: Vec<u32> = numbers.into_iter().filter(|&n| n != 0).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut members = Vec::new();
        let mut iter = sorted.into_iter();
        let mut start = iter.next()?;
        let mut end = start;
        for n in iter {
            if n == end + 1 {
                end = n;
            } else {
                members.push(Self::range(start, end)?);
                start = n;
                end = n;
            }
        }
        members.push(Self::range(start, end)?);

        Some(if members.len() == 1 {
            members.remove(0)
        } else {
            Self::Set(members)
        })
    }

    /// Parses the wire form. Reversed ranges (`5:3`) are normalized.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut members = text
            .split(',')
            .map(Self::parse_member)
            .collect::<Option<Vec<_>>>()?;
        if members.len() == 1 {
            members.pop()
        } else {
            Some(Self::Set(members))
        }
    }

    fn parse_member(text: &str) -> Option<Self> {
        let number = |s: &str| -> Option<Option<u32>> {
            if s == "*" {
                Some(None)
            } else {
                s.parse().ok().filter(|&n| n != 0).map(Some)
            }
        };
        match text.split_once(':') {
            None => Some(number(text)?.map_or(Self::Last, Self::Single)),
            Some((a, b)) => match (number(a)?, number(b)?) {
                (Some(a), Some(b)) => Self::range(a.min(b), a.max(b)),
                (Some(n), None) | (None, Some(n)) => Some(Self::RangeFrom(n)),
                (None, None) => Some(Self::Last),
            },
        }
    }

    /// Number of messages covered, when it is known without the mailbox size.
    #[must_use]
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Self::Single(_) => Some(1),
            Self::Range(low, high) => high
                .checked_sub(*low)
                .and_then(|span| usize::try_from(span).ok())
                .map(|span| span + 1),
            Self::RangeFrom(_) | Self::Last => None,
            Self::Set(members) => members.iter().map(Self::known_len).sum(),
        }
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(low, high) => write!(f, "{low}:{high}"),
            Self::RangeFrom(low) => write!(f, "{low}:*"),
            Self::Last => f.write_str("*"),
            Self::Set(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn range_rejects_inverted_bounds() {
        assert_eq!(SequenceSet::range(5, 2), None);
        assert_eq!(SequenceSet::range(0, 2), None);
        assert_eq!(SequenceSet::range(3, 3), Some(SequenceSet::Single(3)));
    }

    #[test]
    fn parse_wire_forms() {
        assert_eq!(SequenceSet::parse("7"), Some(SequenceSet::Single(7)));
        assert_eq!(SequenceSet::parse("5:3"), Some(SequenceSet::Range(3, 5)));
        assert_eq!(SequenceSet::parse("4:*"), Some(SequenceSet::RangeFrom(4)));
        assert_eq!(SequenceSet::parse("*"), Some(SequenceSet::Last));
        assert_eq!(
            SequenceSet::parse("1:2,9"),
            Some(SequenceSet::Set(vec![SequenceSet::Range(1, 2), SequenceSet::Single(9)]))
        );
        assert_eq!(SequenceSet::parse("0"), None);
        assert_eq!(SequenceSet::parse("1,,2"), None);
        assert_eq!(SequenceSet::parse(""), None);
    }

    #[test]
    fn compress_collapses_runs() {
        let set = SequenceSet::compress([9, 1, 2, 3, 4, 5, 7, 10]).unwrap();
        assert_eq!(set.to_string(), "1:5,7,9:10");
        assert_eq!(set.known_len(), Some(8));
    }

    #[test]
    fn compress_single_run_is_not_wrapped() {
        assert_eq!(
            SequenceSet::compress([3, 4, 5]),
            Some(SequenceSet::Range(3, 5))
        );
        assert_eq!(SequenceSet::compress([]), None);
        assert_eq!(SequenceSet::compress([0]), None);
    }

    #[test]
    fn open_ended_display() {
        assert_eq!(SequenceSet::RangeFrom(40).to_string(), "40:*");
        assert_eq!(SequenceSet::Last.to_string(), "*");
        assert_eq!(SequenceSet::Last.known_len(), None);
    }

    fn expand(set: &SequenceSet) -> Vec<u32> {
        match set {
            SequenceSet::Single(n) => vec![*n],
            SequenceSet::Range(low, high) => (*low..=*high).collect(),
            SequenceSet::Set(members) => members.iter().flat_map(expand).collect(),
            SequenceSet::RangeFrom(_) | SequenceSet::Last => Vec::new(),
        }
    }

    proptest! {
        #[test]
        fn compress_covers_exactly_the_input(
            numbers in proptest::collection::vec(1u32..500, 1..60),
        ) {
            let set = SequenceSet::compress(numbers.iter().copied()).unwrap();
            let mut expected = numbers.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(expand(&set), expected.clone());
            prop_assert_eq!(set.known_len(), Some(expected.len()));
        }
    }
}
