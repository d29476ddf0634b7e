//! # revindex
//!
//! A small on-disk inverted index: it persists, for each keyword, the ordered
//! set of ids that reference it and answers point lookups.
//!
//! ## Features
//!
//! - Append-only, memory-mapped data file
//! - In-memory keyword directory persisted to a sidecar on close
//! - Duplicate appends are no-ops
//! - Optional CRC32 per record
//!
//! ```rust
//! use revindex::InvertedStore;
//!
//! # fn main() -> revindex::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let store = InvertedStore::open(dir.path())?;
//! store.append("rust", 1)?;
//! store.append("rust", 2)?;
//! store.append("rust", 1)?;
//! assert_eq!(store.search("rust")?, vec![1, 2]);
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod directory;
mod error;
pub mod index;
pub mod region;
pub mod source;
pub mod store;

pub use codec::{PostingRecord, RecordCodec};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{Result, RevIndexError};
pub use index::{MemoryIndex, PostingsIndex};
pub use source::{KeywordSource, WordTokenizer, index_document, index_documents};
pub use store::{InvertedStore, StoreStats};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
