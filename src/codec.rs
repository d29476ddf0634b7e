//! Binary encoding of posting records.
//!
//! A record holds one keyword and its full posting list:
//!
//! ```text
//! [u32: keyword_len][keyword bytes][u32: id_count][u64: id] * id_count
//! ```
//!
//! All integers are little-endian. [`RecordCodec`] optionally appends a
//! `[u32: crc32]` over the bytes above, which is how the store frames records
//! in the data file by default.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Result, RevIndexError};

const LEN_SIZE: usize = 4;
const ID_SIZE: usize = 8;
const CRC_SIZE: usize = 4;

/// A decoded record: a keyword and its ordered posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRecord {
    pub keyword: String,
    pub ids: Vec<u64>,
}

/// Size in bytes of the plain encoding of `keyword` with `id_count` ids.
pub fn encoded_len(keyword: &str, id_count: usize) -> usize {
    LEN_SIZE + keyword.len() + LEN_SIZE + id_count * ID_SIZE
}

/// Encode a keyword and its posting list.
pub fn encode(keyword: &str, ids: &[u64]) -> Result<Vec<u8>> {
    let keyword_len: u32 = keyword.len().try_into().map_err(|_| {
        RevIndexError::invalid_argument(format!(
            "keyword length {} exceeds u32::MAX",
            keyword.len()
        ))
    })?;
    let id_count: u32 = ids.len().try_into().map_err(|_| {
        RevIndexError::invalid_argument(format!(
            "posting list length {} exceeds u32::MAX",
            ids.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(encoded_len(keyword, ids.len()));
    buf.write_u32::<LittleEndian>(keyword_len)?;
    buf.extend_from_slice(keyword.as_bytes());
    buf.write_u32::<LittleEndian>(id_count)?;
    for &id in ids {
        buf.write_u64::<LittleEndian>(id)?;
    }
    Ok(buf)
}

/// Decode a buffer holding exactly one record.
pub fn decode(bytes: &[u8]) -> Result<PostingRecord> {
    let (record, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(RevIndexError::decode(format!(
            "{} trailing bytes after record",
            bytes.len() - consumed
        )));
    }
    Ok(record)
}

/// Decode the record at the start of `bytes`, returning it together with the
/// number of bytes it occupies.
pub fn decode_prefix(bytes: &[u8]) -> Result<(PostingRecord, usize)> {
    let mut cursor = Cursor::new(bytes);

    let keyword_len = cursor.read_u32("keyword length")? as usize;
    let keyword_bytes = cursor.take(keyword_len, "keyword")?;
    let keyword = std::str::from_utf8(keyword_bytes)
        .map_err(|e| RevIndexError::decode(format!("keyword is not valid UTF-8: {e}")))?
        .to_string();

    let id_count = cursor.read_u32("id count")? as usize;
    let id_bytes = id_count
        .checked_mul(ID_SIZE)
        .ok_or_else(|| RevIndexError::decode(format!("id count {id_count} overflows")))?;
    let raw_ids = cursor.take(id_bytes, "posting list")?;
    let ids = raw_ids.chunks_exact(ID_SIZE).map(LittleEndian::read_u64).collect();

    Ok((PostingRecord { keyword, ids }, cursor.pos))
}

/// Bounds-checked reader over a byte slice.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let remaining = self.bytes.len() - self.pos;
        if len > remaining {
            return Err(RevIndexError::decode(format!(
                "{what} needs {len} bytes at position {}, only {remaining} available",
                self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        self.take(LEN_SIZE, what).map(LittleEndian::read_u32)
    }
}

/// Record framing used by the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    checksum: bool,
}

impl RecordCodec {
    pub fn new(checksum: bool) -> Self {
        Self { checksum }
    }

    pub fn checksum(&self) -> bool {
        self.checksum
    }

    /// Size in bytes of a framed record.
    pub fn record_len(&self, keyword: &str, id_count: usize) -> usize {
        let plain = encoded_len(keyword, id_count);
        if self.checksum { plain + CRC_SIZE } else { plain }
    }

    pub fn encode(&self, keyword: &str, ids: &[u64]) -> Result<Vec<u8>> {
        let mut buf = encode(keyword, ids)?;
        if self.checksum {
            let crc = crc32fast::hash(&buf);
            buf.write_u32::<LittleEndian>(crc)?;
        }
        Ok(buf)
    }

    /// Decode the framed record at the start of `bytes`.
    pub fn decode_prefix(&self, bytes: &[u8]) -> Result<(PostingRecord, usize)> {
        let (record, consumed) = decode_prefix(bytes)?;
        if !self.checksum {
            return Ok((record, consumed));
        }

        let stored = bytes
            .get(consumed..consumed + CRC_SIZE)
            .map(LittleEndian::read_u32)
            .ok_or_else(|| RevIndexError::decode("record is missing its checksum"))?;
        let actual = crc32fast::hash(&bytes[..consumed]);
        if stored != actual {
            return Err(RevIndexError::decode(format!(
                "checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
            )));
        }
        Ok((record, consumed + CRC_SIZE))
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(true)
    }
}
