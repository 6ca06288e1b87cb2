use regex::{Regex, RegexBuilder};

use crate::blocklist::BlockList;

/// Whether `word` occurs in `text` as a whole word, ignoring case.
///
/// Word boundaries are Unicode-aware, so accented terms match on their own
/// and `"cat"` never matches inside `"category"`.
pub fn contains_whole_word(text: &str, word: &str) -> bool {
    whole_word_pattern(word).is_some_and(|re| re.is_match(text))
}

fn whole_word_pattern(word: &str) -> Option<Regex> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(word)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Block-list compiled once per run.
#[derive(Debug, Clone)]
pub struct WordFilter {
    patterns: Vec<(String, Regex)>,
}

impl WordFilter {
    pub fn new(list: &BlockList) -> Self {
        let patterns = list
            .words()
            .iter()
            .filter_map(|w| whole_word_pattern(w).map(|re| (w.clone(), re)))
            .collect();
        Self { patterns }
    }

    /// First blocked word, in block-list order, found in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(word, _)| word.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
