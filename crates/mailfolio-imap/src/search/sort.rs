//! Sort programs for the SORT extension (RFC 5256).

use std::fmt;

/// Sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Internal date and time.
    Arrival,
    /// First Cc address mailbox.
    Cc,
    /// Sent date and time.
    Date,
    /// First From address mailbox.
    From,
    /// Size in octets.
    Size,
    /// Base subject.
    Subject,
    /// First To address mailbox.
    To,
}

impl SortKey {
    /// Wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Cc => "CC",
            Self::Date => "DATE",
            Self::From => "FROM",
            Self::Size => "SIZE",
            Self::Subject => "SUBJECT",
            Self::To => "TO",
        }
    }

    /// Parses a wire keyword, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let key = match s.to_ascii_uppercase().as_str() {
            "ARRIVAL" => Self::Arrival,
            "CC" => Self::Cc,
            "DATE" => Self::Date,
            "FROM" => Self::From,
            "SIZE" => Self::Size,
            "SUBJECT" => Self::Subject,
            "TO" => Self::To,
            _ => return None,
        };
        Some(key)
    }
}

/// Direction of one sort criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first (`REVERSE`).
    Descending,
}

/// Ordered list of sort criteria.
///
/// Displays as the parenthesized program, e.g. `(REVERSE DATE SUBJECT)`. An
/// empty spec means "no sorting" and displays as nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    criteria: Vec<(SortKey, SortDirection)>,
}

impl SortSpec {
    /// Creates an empty spec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }

    /// Appends an ascending criterion.
    #[must_use]
    pub fn ascending(self, key: SortKey) -> Self {
        self.then(key, SortDirection::Ascending)
    }

    /// Appends a descending criterion.
    #[must_use]
    pub fn descending(self, key: SortKey) -> Self {
        self.then(key, SortDirection::Descending)
    }

    /// Appends a criterion.
    #[must_use]
    pub fn then(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.criteria.push((key, direction));
        self
    }

    /// Criteria in priority order.
    #[must_use]
    pub fn criteria(&self) -> &[(SortKey, SortDirection)] {
        &self.criteria
    }

    /// Returns true if no criterion was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

impl FromIterator<(SortKey, SortDirection)> for SortSpec {
    fn from_iter<I: IntoIterator<Item = (SortKey, SortDirection)>>(iter: I) -> Self {
        Self {
            criteria: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.criteria.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, (key, direction)) in self.criteria.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if *direction == SortDirection::Descending {
                f.write_str("REVERSE ")?;
            }
            f.write_str(key.as_str())?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_text() {
        assert_eq!(SortSpec::new().to_string(), "");
        assert_eq!(SortSpec::new().ascending(SortKey::Arrival).to_string(), "(ARRIVAL)");
        assert_eq!(
            SortSpec::new()
                .descending(SortKey::Date)
                .ascending(SortKey::Subject)
                .to_string(),
            "(REVERSE DATE SUBJECT)"
        );
    }

    #[test]
    fn keys_round_trip_through_text() {
        for key in [
            SortKey::Arrival,
            SortKey::Cc,
            SortKey::Date,
            SortKey::From,
            SortKey::Size,
            SortKey::Subject,
            SortKey::To,
        ] {
            assert_eq!(SortKey::parse(&key.as_str().to_ascii_lowercase()), Some(key));
        }
        assert_eq!(SortKey::parse("THREAD"), None);
    }
}
