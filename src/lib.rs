//! A disk-backed B+-tree secondary index.
//!
//! Keys of one fixed-width kind (integer, float or zero-padded string) map to
//! any number of record ids. Each leaf key points at a chain of overflow
//! buckets holding its RIDs, so duplicate keys never grow the tree itself.
//! Pages are cached per index file in an LRU-K buffer pool.

pub mod buffer;
pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

pub use config::{BufferPoolConfig, IndexConfig};
pub use error::{QuillIndexError, QuillIndexResult};
pub use storage::index::{CompOp, IndexHandle, IndexManager, IndexScan};
pub use storage::key::{IndexKey, KeyKind, MAX_STRING_LEN};
pub use storage::page::RecordId;
