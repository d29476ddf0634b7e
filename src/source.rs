//! Keyword extraction for feeding documents into an index.
//!
//! The store itself never normalizes keywords; whatever a [`KeywordSource`]
//! produces is indexed verbatim.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::index::PostingsIndex;

/// Turns document text into the keywords it should be indexed under.
pub trait KeywordSource {
    fn keywords(&self, text: &str) -> Vec<String>;
}

/// Splits text on Unicode word boundaries.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    lowercase: bool,
    min_len: usize,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self {
            lowercase: true,
            min_len: 1,
        }
    }

    pub fn lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    /// Drop words with fewer than `min_len` characters.
    pub fn min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordSource for WordTokenizer {
    fn keywords(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter(|word| word.chars().count() >= self.min_len)
            .map(|word| {
                if self.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .collect()
    }
}

/// Index every keyword of one document under `id`.
///
/// Returns the number of appends that changed the index.
pub fn index_document<I, S>(index: &I, source: &S, id: u64, text: &str) -> Result<usize>
where
    I: PostingsIndex + ?Sized,
    S: KeywordSource + ?Sized,
{
    let mut written = 0;
    for keyword in source.keywords(text) {
        if index.append(&keyword, id)? {
            written += 1;
        }
    }
    Ok(written)
}

/// Index a stream of `(id, text)` documents.
pub fn index_documents<I, S, D, T>(index: &I, source: &S, documents: D) -> Result<usize>
where
    I: PostingsIndex + ?Sized,
    S: KeywordSource + ?Sized,
    D: IntoIterator<Item = (u64, T)>,
    T: AsRef<str>,
{
    let mut written = 0;
    for (id, text) in documents {
        written += index_document(index, source, id, text.as_ref())?;
    }
    Ok(written)
}
