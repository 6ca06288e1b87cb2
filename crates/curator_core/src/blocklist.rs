use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;

/// Where the words of a [`BlockList`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockListOrigin {
    Remote,
    LocalFile,
    Bundled,
    /// The job runs without a block-list.
    Disabled,
}

impl fmt::Display for BlockListOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockListOrigin::Remote => write!(f, "remote"),
            BlockListOrigin::LocalFile => write!(f, "local file"),
            BlockListOrigin::Bundled => write!(f, "bundled default"),
            BlockListOrigin::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlockListFormatError {
    #[error("malformed block-list document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("block-list document has no usable words")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct BlockListDocument {
    default_words: Vec<String>,
}

/// Ordered set of lowercase terms that disqualify an item.
///
/// A list is fixed for the duration of a run and always comes from exactly
/// one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockList {
    words: Vec<String>,
    origin: BlockListOrigin,
}

impl BlockList {
    /// Trims and lowercases every term, dropping blanks and repeats while
    /// keeping first-seen order.
    pub fn new<I, S>(words: I, origin: BlockListOrigin) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .filter(|w| seen.insert(w.clone()))
            .collect();
        Self { words, origin }
    }

    /// Parses a `{"default_words": [...]}` document. An empty list is an
    /// error so callers fall back instead of running unfiltered.
    pub fn from_json(json: &[u8], origin: BlockListOrigin) -> Result<Self, BlockListFormatError> {
        let doc: BlockListDocument = serde_json::from_slice(json)?;
        let list = Self::new(doc.default_words, origin);
        if list.is_empty() {
            return Err(BlockListFormatError::Empty);
        }
        Ok(list)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn origin(&self) -> BlockListOrigin {
        self.origin
    }

    /// An empty list for jobs that do not filter by words.
    pub fn disabled() -> Self {
        Self {
            words: Vec::new(),
            origin: BlockListOrigin::Disabled,
        }
    }

    /// True when the endpoint could not be used and a fallback was loaded.
    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, BlockListOrigin::LocalFile | BlockListOrigin::Bundled)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
