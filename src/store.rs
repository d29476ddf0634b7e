//! The on-disk inverted index store.
//!
//! [`InvertedStore`] composes the data region, the record codec and the
//! directory:
//!
//! ```text
//! InvertedStore
//! ├── DataRegion  (reverse_index_data.dat, append-only, memory-mapped)
//! │   └── one record per append: keyword + full posting list
//! └── Directory   (reverse_index_index.idx, written on close)
//!     └── keyword -> offset of its latest record
//! ```
//!
//! Every successful append writes the keyword's *entire* posting list as a new
//! record and repoints the directory at it; the previous record becomes dead
//! space. Append cost therefore grows with the length of the list, which is
//! fine for the long tail of rare keywords and slow for a handful of very
//! frequent ones. Dead records are never reclaimed.
//!
//! # Thread safety
//!
//! Appends are serialized by one store-wide [`Mutex`], whatever keyword they
//! touch. The region and the directory sit behind separate
//! [`parking_lot::RwLock`]s; searches only take read locks. A record is fully
//! copied into the mapping before its offset is published in the directory, so
//! a search never sees an offset whose bytes are still being written.
//!
//! # Durability
//!
//! The directory is only persisted by [`InvertedStore::close`]. If the process
//! exits without closing, the data file keeps its bytes but the keywords
//! appended since the last close are unreachable on the next open.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::codec::RecordCodec;
use crate::config::StoreConfig;
use crate::directory::{Directory, SnapshotMeta};
use crate::error::{Result, RevIndexError};
use crate::index::PostingsIndex;
use crate::region::DataRegion;

/// Point-in-time counters for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Keywords reachable through the directory.
    pub keywords: usize,
    /// Logical length of the data file, dead records included.
    pub data_bytes: u64,
    /// Records written since the store was opened.
    pub records_appended: u64,
    /// Appends skipped since open because the id was already present.
    pub duplicates_skipped: u64,
}

#[derive(Debug)]
pub struct InvertedStore {
    base_dir: PathBuf,
    directory_path: PathBuf,
    config: StoreConfig,
    codec: RecordCodec,
    region: RwLock<DataRegion>,
    directory: RwLock<Directory>,
    append_lock: Mutex<()>,
    records_appended: AtomicU64,
    duplicates_skipped: AtomicU64,
}

impl InvertedStore {
    /// Open the store in `base_dir` with the default configuration.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        Self::open_with_config(base_dir, StoreConfig::default())
    }

    /// Open the store in `base_dir`, creating the directory and both files
    /// as needed.
    pub fn open_with_config<P: AsRef<Path>>(base_dir: P, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        let data_path = base_dir.join(&config.data_file);
        let directory_path = base_dir.join(&config.directory_file);

        let region = DataRegion::open(&data_path, config.min_growth_bytes)?;
        let (directory, checksum) = Self::load_directory(&directory_path, &region, &config)?;

        log::info!(
            "opened store at {}: {} bytes of data, {} keywords",
            base_dir.display(),
            region.len(),
            directory.len()
        );

        Ok(Self {
            base_dir,
            directory_path,
            config,
            codec: RecordCodec::new(checksum),
            region: RwLock::new(region),
            directory: RwLock::new(directory),
            append_lock: Mutex::new(()),
            records_appended: AtomicU64::new(0),
            duplicates_skipped: AtomicU64::new(0),
        })
    }

    /// Load the sidecar, falling back to an empty directory when it cannot be
    /// decoded. Returns the directory and the record framing to use.
    fn load_directory(
        path: &Path,
        region: &DataRegion,
        config: &StoreConfig,
    ) -> Result<(Directory, bool)> {
        let (mut directory, meta) = match Directory::load(path) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                if !region.is_empty() {
                    log::warn!(
                        "{} holds {} bytes but {} is missing; existing records are unreachable",
                        region.path().display(),
                        region.len(),
                        path.display()
                    );
                }
                return Ok((Directory::new(), config.checksum));
            }
            Err(err @ RevIndexError::Io(_)) => return Err(err),
            Err(e) => {
                log::warn!(
                    "failed to load directory {}: {e}; starting with an empty directory",
                    path.display()
                );
                return Ok((Directory::new(), config.checksum));
            }
        };

        if meta.checksum != config.checksum {
            log::warn!(
                "{} was written with checksum={}, ignoring configured checksum={}",
                path.display(),
                meta.checksum,
                config.checksum
            );
        }
        if meta.data_len > region.len() {
            log::warn!(
                "{} is {} bytes, shorter than the {} bytes recorded at last close",
                region.path().display(),
                region.len(),
                meta.data_len
            );
        }
        let dropped = directory.retain_below(region.len());
        if !dropped.is_empty() {
            log::warn!(
                "dropped {} directory entries pointing past the end of {}",
                dropped.len(),
                region.path().display()
            );
        }

        Ok((directory, meta.checksum))
    }

    /// Add `id` to the posting list of `keyword`.
    ///
    /// Returns `false` without writing anything when `id` is already listed.
    pub fn append(&self, keyword: &str, id: u64) -> Result<bool> {
        let _guard = self.append_lock.lock();

        let current = self.directory.read().lookup(keyword);
        let mut ids = match current {
            Some(offset) => {
                let region = self.region.read();
                self.read_postings(&region, keyword, offset)?
            }
            None => Vec::new(),
        };

        if ids.contains(&id) {
            self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            log::debug!("skipping duplicate id {id} for keyword '{keyword}'");
            return Ok(false);
        }
        ids.push(id);

        let bytes = self.codec.encode(keyword, &ids)?;
        let offset = {
            let mut region = self.region.write();
            let offset = region.append(&bytes)?;
            if self.config.sync_on_append {
                region.flush_range(offset, bytes.len())?;
            }
            offset
        };

        self.directory.write().set(keyword, offset);
        self.records_appended.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Append several ids to one keyword. Returns how many were new.
    pub fn append_many<I>(&self, keyword: &str, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut written = 0;
        for id in ids {
            if self.append(keyword, id)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// The posting list of `keyword`, in append order.
    ///
    /// An unknown keyword yields an empty list.
    pub fn search(&self, keyword: &str) -> Result<Vec<u64>> {
        let Some(offset) = self.directory.read().lookup(keyword) else {
            return Ok(Vec::new());
        };
        let region = self.region.read();
        self.read_postings(&region, keyword, offset)
    }

    fn read_postings(&self, region: &DataRegion, keyword: &str, offset: u64) -> Result<Vec<u64>> {
        let bytes = region.read_from(offset)?;
        let (record, _) = self
            .codec
            .decode_prefix(bytes)
            .map_err(|e| RevIndexError::corruption(offset, e.to_string()))?;
        if record.keyword != keyword {
            return Err(RevIndexError::corruption(
                offset,
                format!("expected keyword '{keyword}', found '{}'", record.keyword),
            ));
        }
        Ok(record.ids)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.directory.read().lookup(keyword).is_some()
    }

    pub fn keyword_count(&self) -> usize {
        self.directory.read().len()
    }

    /// Logical length of the data file in bytes.
    pub fn data_len(&self) -> u64 {
        self.region.read().len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keywords: self.keyword_count(),
            data_bytes: self.data_len(),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether records in this store carry a CRC32.
    pub fn checksum(&self) -> bool {
        self.codec.checksum()
    }

    /// Flush the data file and persist the directory.
    pub fn close(self) -> Result<()> {
        let region = self.region.into_inner();
        let data_len = region.len();
        region.close()?;

        let directory = self.directory.into_inner();
        let meta = SnapshotMeta {
            checksum: self.codec.checksum(),
            data_len,
        };
        directory.save(&self.directory_path, meta)?;

        log::info!(
            "closed store at {}: {} bytes of data, {} keywords",
            self.base_dir.display(),
            data_len,
            directory.len()
        );
        Ok(())
    }
}

impl PostingsIndex for InvertedStore {
    fn append(&self, keyword: &str, id: u64) -> Result<bool> {
        InvertedStore::append(self, keyword, id)
    }

    fn search(&self, keyword: &str) -> Result<Vec<u64>> {
        InvertedStore::search(self, keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> InvertedStore {
        InvertedStore::open(dir.path()).unwrap()
    }

    #[test]
    fn test_append_search_scenario() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.append("java", 1001).unwrap();
        store.append("java", 1002).unwrap();
        store.append("search", 1003).unwrap();
        store.append("api", 1001).unwrap();
        store.append("api", 1003).unwrap();
        store.append("api", 1004).unwrap();
        assert!(!store.append("java", 1001).unwrap());

        assert_eq!(store.search("java").unwrap(), vec![1001, 1002]);
        assert_eq!(store.search("search").unwrap(), vec![1003]);
        assert_eq!(store.search("api").unwrap(), vec![1001, 1003, 1004]);
        assert!(store.search("nonexistent").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_append_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.append("k", 7).unwrap());
        let len = store.data_len();
        assert!(!store.append("k", 7).unwrap());
        assert_eq!(store.data_len(), len);

        let stats = store.stats();
        assert_eq!(stats.records_appended, 1);
        assert_eq!(stats.duplicates_skipped, 1);
        assert_eq!(stats.keywords, 1);
    }

    #[test]
    fn test_every_append_rewrites_full_list() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let codec = RecordCodec::new(true);

        store.append("k", 1).unwrap();
        store.append("k", 2).unwrap();
        store.append("k", 3).unwrap();

        let expected: usize = (1..=3).map(|n| codec.record_len("k", n)).sum();
        assert_eq!(store.data_len(), expected as u64);
    }

    #[test]
    fn test_plain_framing_uses_bare_layout() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::builder().checksum(false).build().unwrap();
        let store = InvertedStore::open_with_config(dir.path(), config).unwrap();

        store.append("api", 1001).unwrap();
        assert_eq!(store.data_len(), codec::encoded_len("api", 1) as u64);
        assert!(!store.checksum());
    }

    #[test]
    fn test_keyword_mismatch_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.append("java", 1).unwrap();

        store.directory.write().set("rust", 0);
        let err = store.search("rust").unwrap_err();
        assert!(matches!(err, RevIndexError::Corruption { offset: 0, .. }));
    }

    #[test]
    fn test_offset_inside_record_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.append("java", 1).unwrap();

        store.directory.write().set("java", 3);
        assert!(store.search("java").unwrap_err().is_corruption());
        // A failed read aborts the append too.
        assert!(store.append("java", 2).is_err());
    }

    #[test]
    fn test_empty_keyword() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.append("", 1).is_ok());
        assert_eq!(store.search("").unwrap(), vec![1]);
    }
}
