use thiserror::Error;

use crate::buffer::PageNum;
use crate::storage::page::RecordId;

pub type QuillIndexResult<T, E = QuillIndexError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum QuillIndexError {
    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("Duplicate entry: {0} is already indexed under this key")]
    DuplicateEntry(RecordId),

    #[error("Entry not found: {0}")]
    RidNotFound(RecordId),

    #[error("Invalid page number: {0}")]
    InvalidPage(PageNum),

    #[error("Page {0} is still pinned")]
    PagePinned(PageNum),

    #[error("No buffer space: all {0} frames are pinned")]
    NoBufferSpace(usize),

    #[error("File is closed")]
    FileClosed,

    #[error("File is open: {0}")]
    FileOpen(String),

    #[error("File already exists: {0}")]
    FileExists(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Corrupt page {page}: {reason}")]
    CorruptPage { page: PageNum, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
