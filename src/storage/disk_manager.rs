use log::debug;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::buffer::{PageNum, PAGE_SIZE};
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::codec::FileHeaderCodec;
use crate::storage::page::{FileHeader, FILE_HEADER_SIZE};

static EMPTY_PAGE: [u8; PAGE_SIZE] = [0; PAGE_SIZE];

/// Page I/O on one OS file. The file starts with a one-page header recording
/// the number of data pages; data page `n` lives right after it at
/// `FILE_HEADER_SIZE + n * PAGE_SIZE`.
#[derive(Debug)]
pub struct DiskManager {
    path: PathBuf,
    num_pages: AtomicU32,
    // one handle shared by every page transfer
    db_file: Mutex<File>,
    header: Mutex<FileHeader>,
}

impl DiskManager {
    /// Creates a new paged file. Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>) -> QuillIndexResult<Self> {
        let path = path.as_ref();
        let mut db_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    QuillIndexError::FileExists(path.display().to_string())
                }
                _ => e.into(),
            })?;
        let header = FileHeader::try_new()?;
        db_file.write_all(&FileHeaderCodec::encode(&header))?;
        db_file.flush()?;
        debug!("created paged file {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            num_pages: AtomicU32::new(0),
            db_file: Mutex::new(db_file),
            header: Mutex::new(header),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> QuillIndexResult<Self> {
        let path = path.as_ref();
        let mut db_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    QuillIndexError::FileNotFound(path.display().to_string())
                }
                _ => e.into(),
            })?;
        let mut buf = vec![0; FILE_HEADER_SIZE];
        db_file.read_exact(&mut buf)?;
        let (header, _) = FileHeaderCodec::decode(&buf)?;

        let db_file_len = db_file.metadata()?.len();
        let expected_len = (FILE_HEADER_SIZE + header.num_pages as usize * PAGE_SIZE) as u64;
        if db_file_len < expected_len {
            return Err(QuillIndexError::Internal(format!(
                "file {:?} holds {} bytes but its header records {} pages",
                path, db_file_len, header.num_pages
            )));
        }
        debug!("opened paged file {:?} with {} pages", path, header.num_pages);

        Ok(Self {
            path: path.to_path_buf(),
            num_pages: AtomicU32::new(header.num_pages),
            db_file: Mutex::new(db_file),
            header: Mutex::new(header),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }

    pub fn check_page_num(&self, page_num: PageNum) -> QuillIndexResult<()> {
        if page_num < 0 || page_num as u32 >= self.num_pages() {
            return Err(QuillIndexError::InvalidPage(page_num));
        }
        Ok(())
    }

    fn page_offset(page_num: PageNum) -> u64 {
        (FILE_HEADER_SIZE + page_num as usize * PAGE_SIZE) as u64
    }

    pub fn read_page(&self, page_num: PageNum, buf: &mut [u8]) -> QuillIndexResult<()> {
        self.check_page_num(page_num)?;
        let mut guard = self.db_file.lock();
        guard.seek(SeekFrom::Start(Self::page_offset(page_num)))?;
        guard.read_exact(&mut buf[..PAGE_SIZE])?;
        Ok(())
    }

    pub fn write_page(&self, page_num: PageNum, data: &[u8]) -> QuillIndexResult<()> {
        self.check_page_num(page_num)?;
        if data.len() != PAGE_SIZE {
            return Err(QuillIndexError::Internal(format!(
                "Page size is not {}",
                PAGE_SIZE
            )));
        }
        let mut guard = self.db_file.lock();
        guard.seek(SeekFrom::Start(Self::page_offset(page_num)))?;
        guard.write_all(data)?;
        Ok(())
    }

    /// Appends a zeroed page and records it in the file header.
    pub fn allocate_page(&self) -> QuillIndexResult<PageNum> {
        let mut guard = self.db_file.lock();
        let page_num = self.num_pages.load(Ordering::SeqCst) as PageNum;
        guard.seek(SeekFrom::Start(Self::page_offset(page_num)))?;
        guard.write_all(&EMPTY_PAGE)?;

        let mut header = self.header.lock();
        header.num_pages = page_num as u32 + 1;
        guard.seek(SeekFrom::Start(0))?;
        guard.write_all(&FileHeaderCodec::encode(&header))?;
        self.num_pages.store(header.num_pages, Ordering::SeqCst);
        Ok(page_num)
    }

    pub fn sync(&self) -> QuillIndexResult<()> {
        let mut guard = self.db_file.lock();
        guard.flush()?;
        guard.sync_all()?;
        Ok(())
    }
}
