//! Append-only, memory-mapped data file.
//!
//! [`DataRegion`] tracks two sizes:
//!
//! - the *logical length*, the number of bytes that belong to appended data;
//! - the *capacity*, the size of the mapped window.
//!
//! The file itself is always exactly the logical length: every append extends
//! it by the size of the new bytes before copying them in. Only the mapping
//! runs ahead of the file, so most appends are a `set_len` plus a plain copy.
//! Growing the window means replacing the mapping, which costs a flush of dirty
//! pages plus a new `mmap` call; growth doubles the capacity (at least
//! `min_growth` bytes) to keep that cost amortized. Window bytes past the end of
//! the file are never touched, so an unclean shutdown leaves no padding behind.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{Result, RevIndexError};

#[derive(Debug)]
pub struct DataRegion {
    path: PathBuf,
    file: File,
    map: Option<MmapMut>,
    len: u64,
    min_growth: u64,
}

impl DataRegion {
    /// Open or create the data file at `path`.
    ///
    /// The whole existing file is treated as appended data. An empty file is
    /// valid and is not mapped until the first append.
    pub fn open<P: AsRef<Path>>(path: P, min_growth: u64) -> Result<Self> {
        if min_growth == 0 {
            return Err(RevIndexError::invalid_argument(
                "min_growth must be greater than zero",
            ));
        }
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let len = file.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            Some(Self::map_file(&file, len)?)
        };

        Ok(Self {
            path,
            file,
            map,
            len,
            min_growth,
        })
    }

    #[allow(unsafe_code)]
    fn map_file(file: &File, len: u64) -> Result<MmapMut> {
        let len = to_usize(len)?;
        // SAFETY: the file is owned by this region; the store does not support
        // other processes touching it while open, and it is never shrunk while
        // a mapping exists. The window may extend past the end of the file;
        // only bytes below the file length are ever accessed.
        let map = unsafe { MmapOptions::new().len(len).map_mut(file)? };
        Ok(map)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the mapped window in bytes.
    pub fn capacity(&self) -> u64 {
        self.map.as_ref().map_or(0, |map| map.len() as u64)
    }

    /// Make sure the mapped window covers at least `required` bytes.
    ///
    /// The file length is left alone. The old mapping stays in place until the
    /// new one is established, so a failed remap leaves the region usable at
    /// its previous capacity.
    pub fn ensure_capacity(&mut self, required: u64) -> Result<()> {
        let capacity = self.capacity();
        if required <= capacity {
            return Ok(());
        }

        let new_capacity = required
            .max(capacity.saturating_mul(2))
            .max(capacity.saturating_add(self.min_growth));

        if let Some(map) = &self.map {
            map.flush()?;
        }
        let map = Self::map_file(&self.file, new_capacity)?;
        self.map = Some(map);

        log::debug!(
            "remapped {} from {} to {} bytes",
            self.path.display(),
            capacity,
            new_capacity
        );
        Ok(())
    }

    /// Append `bytes` at the logical end and return the offset they start at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.len;
        if bytes.is_empty() {
            return Ok(offset);
        }

        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| RevIndexError::invalid_argument("data region offset overflow"))?;
        self.ensure_capacity(end)?;
        self.file.set_len(end)?;

        let start = to_usize(offset)?;
        let map = self
            .map
            .as_mut()
            .ok_or_else(|| RevIndexError::invalid_argument("data region is not mapped"))?;
        map[start..start + bytes.len()].copy_from_slice(bytes);
        self.len = end;

        Ok(offset)
    }

    /// Exactly `length` bytes starting at `offset`.
    pub fn read(&self, offset: u64, length: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(length as u64)
            .filter(|&end| end <= self.len)
            .ok_or_else(|| {
                RevIndexError::corruption(
                    offset,
                    format!("read of {length} bytes exceeds data length {}", self.len),
                )
            })?;

        match &self.map {
            Some(map) => Ok(&map[to_usize(offset)?..to_usize(end)?]),
            None => Ok(&[][..]),
        }
    }

    /// All appended bytes from `offset` to the logical end.
    pub fn read_from(&self, offset: u64) -> Result<&[u8]> {
        if offset > self.len {
            return Err(RevIndexError::corruption(
                offset,
                format!("offset is beyond data length {}", self.len),
            ));
        }
        self.read(offset, to_usize(self.len - offset)?)
    }

    /// Flush all written bytes to disk.
    pub fn flush(&self) -> Result<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }

    /// Flush the bytes of a single appended range to disk.
    pub fn flush_range(&self, offset: u64, length: usize) -> Result<()> {
        if let Some(map) = &self.map {
            map.flush_range(to_usize(offset)?, length)?;
        }
        Ok(())
    }

    /// Flush, unmap and sync the file.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.map = None;
        self.file.sync_all()?;
        Ok(())
    }
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        RevIndexError::invalid_argument(format!("{value} does not fit in the address space"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_region(dir: &TempDir, min_growth: u64) -> DataRegion {
        DataRegion::open(dir.path().join("data.bin"), min_growth).unwrap()
    }

    #[test]
    fn test_open_empty() {
        let dir = TempDir::new().unwrap();
        let region = open_region(&dir, 64);
        assert!(region.is_empty());
        assert_eq!(region.capacity(), 0);
        assert_eq!(region.read_from(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_append_returns_offsets() {
        let dir = TempDir::new().unwrap();
        let mut region = open_region(&dir, 64);

        assert_eq!(region.append(b"hello").unwrap(), 0);
        assert_eq!(region.append(b"world").unwrap(), 5);
        assert_eq!(region.len(), 10);
        assert_eq!(region.read(5, 5).unwrap(), b"world");
        assert_eq!(region.read_from(0).unwrap(), b"helloworld");
    }

    #[test]
    fn test_growth_preserves_data() {
        let dir = TempDir::new().unwrap();
        let mut region = open_region(&dir, 4);

        let mut expected = Vec::new();
        let mut last_capacity = 0;
        let mut remaps = 0;
        for i in 0..50u8 {
            let chunk = vec![i; (i as usize % 7) + 1];
            let offset = region.append(&chunk).unwrap();
            assert_eq!(offset, expected.len() as u64);
            expected.extend_from_slice(&chunk);

            if region.capacity() != last_capacity {
                remaps += 1;
                last_capacity = region.capacity();
            }
            assert!(region.capacity() >= region.len());
        }

        assert!(remaps > 1);
        assert_eq!(region.read_from(0).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_ensure_capacity_doubles() {
        let dir = TempDir::new().unwrap();
        let mut region = open_region(&dir, 16);

        region.ensure_capacity(1).unwrap();
        assert_eq!(region.capacity(), 16);
        region.ensure_capacity(17).unwrap();
        assert_eq!(region.capacity(), 32);
        region.ensure_capacity(10).unwrap();
        assert_eq!(region.capacity(), 32);
        region.ensure_capacity(100).unwrap();
        assert_eq!(region.capacity(), 100);
        assert!(region.is_empty());
    }

    #[test]
    fn test_reads_never_reach_capacity_tail() {
        let dir = TempDir::new().unwrap();
        let mut region = open_region(&dir, 1024);
        region.append(b"abc").unwrap();
        assert!(region.capacity() > 3);

        assert!(region.read(0, 4).is_err());
        assert!(region.read(3, 1).is_err());
        assert!(region.read_from(4).is_err());
        assert_eq!(region.read_from(3).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        {
            let mut region = DataRegion::open(&path, 4096).unwrap();
            region.append(b"persisted").unwrap();
            region.flush_range(0, 9).unwrap();
            region.close().unwrap();
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 9);

        let mut region = DataRegion::open(&path, 4096).unwrap();
        assert_eq!(region.len(), 9);
        assert_eq!(region.read(0, 9).unwrap(), b"persisted");
        assert_eq!(region.append(b"!").unwrap(), 9);
    }

    #[test]
    fn test_file_length_tracks_logical_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        {
            let mut region = DataRegion::open(&path, 4096).unwrap();
            region.append(b"abc").unwrap();
            assert_eq!(std::fs::metadata(&path).unwrap().len(), 3);
            region.append(b"defg").unwrap();
            assert_eq!(region.capacity(), 4096);
            // Dropped without close.
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 7);

        let region = DataRegion::open(&path, 4096).unwrap();
        assert_eq!(region.len(), 7);
        assert_eq!(region.read_from(0).unwrap(), b"abcdefg");
    }

    #[test]
    fn test_ensure_capacity_leaves_file_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        let mut region = DataRegion::open(&path, 16).unwrap();
        region.ensure_capacity(64).unwrap();
        assert_eq!(region.capacity(), 64);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_rejects_zero_growth() {
        let dir = TempDir::new().unwrap();
        assert!(DataRegion::open(dir.path().join("data.bin"), 0).is_err());
    }
}
