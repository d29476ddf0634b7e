//! The append/search contract shared by postings backends.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;

/// A keyword to posting-list index.
///
/// Implementations keep the ids of each keyword unique and in order of first
/// append, and answer unknown keywords with an empty list.
pub trait PostingsIndex: Send + Sync {
    /// Add `id` to the posting list of `keyword`.
    ///
    /// Returns `false` when `id` was already present and nothing changed.
    fn append(&self, keyword: &str, id: u64) -> Result<bool>;

    /// The posting list of `keyword`, in append order.
    fn search(&self, keyword: &str) -> Result<Vec<u64>>;
}

/// Volatile in-memory backend with the same semantics as the on-disk store.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    postings: RwLock<HashMap<String, Vec<u64>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword_count(&self) -> usize {
        self.postings.read().len()
    }
}

impl PostingsIndex for MemoryIndex {
    fn append(&self, keyword: &str, id: u64) -> Result<bool> {
        let mut postings = self.postings.write();
        let ids = postings.entry(keyword.to_string()).or_default();
        if ids.contains(&id) {
            return Ok(false);
        }
        ids.push(id);
        Ok(true)
    }

    fn search(&self, keyword: &str) -> Result<Vec<u64>> {
        Ok(self
            .postings
            .read()
            .get(keyword)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_index_dedup_and_order() {
        let index = MemoryIndex::new();
        assert!(index.append("api", 1004).unwrap());
        assert!(index.append("api", 1001).unwrap());
        assert!(!index.append("api", 1004).unwrap());

        assert_eq!(index.search("api").unwrap(), vec![1004, 1001]);
        assert!(index.search("missing").unwrap().is_empty());
        assert_eq!(index.keyword_count(), 1);
    }
}
