//! # Chunk Accumulator
//!
//! Merges ordered fragments into the running response text. The backend
//! owns token boundaries, so fragments are concatenated byte-for-byte:
//! no trimming, no typography fixes, no coalescing of whitespace-only
//! fragments.

/// Pure concatenation of `fragment` onto `existing`.
pub fn append(existing: &str, fragment: &str) -> String {
    let mut out = String::with_capacity(existing.len() + fragment.len());
    out.push_str(existing);
    out.push_str(fragment);
    out
}

/// Running accumulation for one StreamSession.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Accumulator {
    text: String,
    fragments: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends in place and returns the text so far.
    pub fn push(&mut self, fragment: &str) -> &str {
        self.text.push_str(fragment);
        self.fragments += 1;
        &self.text
    }

    /// Replays an ordered fragment list against an empty accumulator.
    pub fn replay<'a, I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut acc = Self::new();
        for fragment in fragments {
            acc.push(fragment);
        }
        acc
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of fragments received, including empty ones.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn is_untouched(&self) -> bool {
        self.fragments == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_plain_concatenation() {
        assert_eq!(append("Hi", " there"), "Hi there");
        assert_eq!(append("", ""), "");
    }

    #[test]
    fn whitespace_only_fragments_are_kept() {
        let acc = Accumulator::replay(["a", " ", "\n", "  ", "b"]);
        assert_eq!(acc.text(), "a \n  b");
        assert_eq!(acc.fragment_count(), 5);
    }

    #[test]
    fn no_trimming_at_the_edges() {
        let acc = Accumulator::replay(["  leading", "trailing  \n"]);
        assert_eq!(acc.text(), "  leadingtrailing  \n");
    }

    #[test]
    fn replay_is_deterministic() {
        let fragments = ["Hi", " there", "!", "", " 👋"];
        let first = Accumulator::replay(fragments);
        let second = Accumulator::replay(fragments);
        assert_eq!(first, second);
        assert_eq!(first.text(), fragments.concat());
    }

    #[test]
    fn push_matches_fold_over_append() {
        let fragments = ["one", " two", "  ", "three"];
        let folded = fragments.iter().fold(String::new(), |acc, f| append(&acc, f));
        assert_eq!(Accumulator::replay(fragments).text(), folded);
    }

    #[test]
    fn empty_fragment_counts_but_adds_nothing() {
        let mut acc = Accumulator::new();
        assert!(acc.is_untouched());
        assert_eq!(acc.push(""), "");
        assert!(!acc.is_untouched());
    }
}
