//! Command tag generator.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::Tag;

/// Generates the tags `A0001`, `A0002`, ... for one connection.
///
/// The counter wraps after `u32::MAX` commands; by then every earlier tag has
/// long been completed, so tags stay unique among in-flight commands.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a generator whose tags start with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(1),
            prefix,
        }
    }

    /// Returns the next tag.
    pub fn next(&self) -> Tag {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Tag::new(format!("{}{n:04}", self.prefix))
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tags_are_sequential_and_padded() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next().as_str(), "A0001");
        assert_eq!(tags.next().as_str(), "A0002");
    }

    #[test]
    fn custom_prefix() {
        let tags = TagGenerator::new('S');
        assert_eq!(tags.next().as_str(), "S0001");
    }

    #[test]
    fn padding_grows_past_four_digits() {
        let tags = TagGenerator::default();
        tags.counter.store(12_345, Ordering::Relaxed);
        assert_eq!(tags.next().as_str(), "A12345");
    }

    #[test]
    fn tags_are_unique() {
        let tags = TagGenerator::default();
        let seen: HashSet<String> = (0..5000).map(|_| tags.next().as_str().to_string()).collect();
        assert_eq!(seen.len(), 5000);
    }
}
