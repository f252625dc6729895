//! Message flags.

use std::fmt;

/// A system flag or keyword attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent` (session flag, cannot be stored).
    Recent,
    /// `\*` in PERMANENTFLAGS: new keywords may be created.
    MayCreate,
    /// Any other flag or keyword, kept verbatim.
    Keyword(String),
}

impl Flag {
    /// Parses a flag atom. System flags match case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let Some(name) = s.strip_prefix('\\') else {
            return Self::Keyword(s.to_string());
        };
        match name.to_ascii_uppercase().as_str() {
            "SEEN" => Self::Seen,
            "ANSWERED" => Self::Answered,
            "FLAGGED" => Self::Flagged,
            "DELETED" => Self::Deleted,
            "DRAFT" => Self::Draft,
            "RECENT" => Self::Recent,
            "*" => Self::MayCreate,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Wire form of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::MayCreate => "\\*",
            Self::Keyword(keyword) => keyword,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of flags without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<Flag>);

impl Flags {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag unless already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    /// Removes a flag if present.
    pub fn remove(&mut self, flag: &Flag) {
        self.0.retain(|f| f != flag);
    }

    /// Whether the flag is set.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Whether `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Whether `\Deleted` is set.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Whether `\Flagged` is set.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.contains(&Flag::Flagged)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Flag> {
        self.0.iter()
    }

    /// Number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl<'a> IntoIterator for &'a Flags {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_flags_parse_case_insensitively() {
        assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
        assert_eq!(Flag::parse("\\deleted"), Flag::Deleted);
        assert_eq!(Flag::parse("\\*"), Flag::MayCreate);
    }

    #[test]
    fn keywords_keep_their_spelling() {
        assert_eq!(Flag::parse("$Forwarded").as_str(), "$Forwarded");
        assert_eq!(Flag::parse("\\Custom"), Flag::Keyword("\\Custom".into()));
    }

    #[test]
    fn collecting_deduplicates() {
        let flags: Flags = [Flag::Seen, Flag::Deleted, Flag::Seen].into_iter().collect();
        assert_eq!(flags.len(), 2);
        assert!(flags.is_seen());
        assert!(flags.is_deleted());
        assert!(!flags.is_flagged());
    }

    #[test]
    fn remove_drops_only_that_flag() {
        let mut flags: Flags = [Flag::Seen, Flag::Flagged].into_iter().collect();
        flags.remove(&Flag::Seen);
        assert_eq!(flags.iter().collect::<Vec<_>>(), vec![&Flag::Flagged]);
    }
}
