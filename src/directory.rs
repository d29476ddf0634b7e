//! In-memory keyword directory and its sidecar persistence.
//!
//! The directory maps every keyword to the offset of its latest record in the
//! data file. It lives entirely in memory while the store is open and is
//! written out as a single JSON snapshot when the store is closed.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RevIndexError};

const SNAPSHOT_VERSION: u32 = 1;

/// Facts about the data file recorded alongside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotMeta {
    /// Whether records carry a trailing CRC32.
    pub checksum: bool,
    /// Logical length of the data file when the snapshot was taken.
    pub data_len: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectorySnapshot {
    version: u32,
    checksum: bool,
    data_len: u64,
    entries: BTreeMap<String, u64>,
}

/// Keyword to latest-record-offset mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: HashMap<String, u64>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, keyword: &str) -> Option<u64> {
        self.entries.get(keyword).copied()
    }

    /// Point `keyword` at `offset`, returning the offset it replaced.
    pub fn set(&mut self, keyword: &str, offset: u64) -> Option<u64> {
        match self.entries.get_mut(keyword) {
            Some(current) => Some(std::mem::replace(current, offset)),
            None => {
                self.entries.insert(keyword.to_string(), offset);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop every entry whose offset is not below `data_len`.
    ///
    /// Returns the dropped keywords.
    pub fn retain_below(&mut self, data_len: u64) -> Vec<String> {
        let dropped: Vec<String> = self
            .entries
            .iter()
            .filter(|&(_, &offset)| offset >= data_len)
            .map(|(keyword, _)| keyword.clone())
            .collect();
        for keyword in &dropped {
            self.entries.remove(keyword);
        }
        dropped
    }

    /// Serialize the whole directory into one blob.
    pub fn snapshot(&self, meta: SnapshotMeta) -> Result<Vec<u8>> {
        let snapshot = DirectorySnapshot {
            version: SNAPSHOT_VERSION,
            checksum: meta.checksum,
            data_len: meta.data_len,
            entries: self
                .entries
                .iter()
                .map(|(keyword, &offset)| (keyword.clone(), offset))
                .collect(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    /// Rebuild a directory from a blob produced by [`Directory::snapshot`].
    pub fn restore(bytes: &[u8]) -> Result<(Self, SnapshotMeta)> {
        let snapshot: DirectorySnapshot = serde_json::from_slice(bytes)
            .map_err(|e| RevIndexError::decode(format!("failed to deserialize directory: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RevIndexError::decode(format!(
                "unsupported directory snapshot version {}",
                snapshot.version
            )));
        }

        let meta = SnapshotMeta {
            checksum: snapshot.checksum,
            data_len: snapshot.data_len,
        };
        let directory = Self {
            entries: snapshot.entries.into_iter().collect(),
        };
        Ok((directory, meta))
    }

    /// Write the snapshot to `path`, replacing any previous file.
    pub fn save(&self, path: &Path, meta: SnapshotMeta) -> Result<()> {
        let bytes = self.snapshot(meta)?;

        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        std::fs::write(&tmp, &bytes)?;
        std::fs::File::open(&tmp)?.sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read the snapshot at `path`, or `None` when there is no sidecar.
    pub fn load(path: &Path) -> Result<Option<(Self, SnapshotMeta)>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        Self::restore(&bytes).map(Some)
    }
}
