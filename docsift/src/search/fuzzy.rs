//! Word-level matching for the multi-word scan

use crate::config::MatchMode;
use rapidfuzz::distance::levenshtein;

/// Lowercased query words, split on whitespace
pub fn query_words(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Decides whether a query word hits a field
#[derive(Debug, Clone, Copy)]
pub struct WordMatcher {
    mode: MatchMode,
    threshold: usize,
}

impl WordMatcher {
    pub fn new(mode: MatchMode, threshold: usize) -> Self {
        Self { mode, threshold }
    }

    /// `word` must already be lowercased
    pub fn hits(&self, word: &str, field: &str) -> bool {
        let field = field.to_lowercase();
        if field.contains(word) {
            return true;
        }

        match self.mode {
            MatchMode::Substring => false,
            MatchMode::Fuzzy => within_distance(word, &field, self.threshold),
        }
    }

    /// Every word hits at least one of `fields`
    pub fn matches_all<'a, F>(&self, words: &[String], fields: F) -> bool
    where
        F: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().collect();
        !words.is_empty()
            && words
                .iter()
                .all(|word| fields.iter().any(|field| self.hits(word, field)))
    }
}

fn within_distance(a: &str, b: &str, threshold: usize) -> bool {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la.abs_diff(lb) > threshold {
        return false;
    }
    levenshtein::distance(a.chars(), b.chars()) <= threshold
}
