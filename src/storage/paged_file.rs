use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::buffer::{BufferPool, PageNum, ReadPageGuard, WritePageGuard};
use crate::config::BufferPoolConfig;
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::disk_manager::DiskManager;

type OpenFiles = Arc<Mutex<HashSet<PathBuf>>>;

/// Creates, destroys, opens and closes paged files. A path can be open at most
/// once per manager, and an open file cannot be destroyed.
#[derive(Debug, Default)]
pub struct PagedFileManager {
    config: BufferPoolConfig,
    open_files: OpenFiles,
}

impl PagedFileManager {
    pub fn new(config: BufferPoolConfig) -> Self {
        Self {
            config,
            open_files: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn create_file(&self, path: impl AsRef<Path>) -> QuillIndexResult<()> {
        DiskManager::create(path)?;
        Ok(())
    }

    pub fn destroy_file(&self, path: impl AsRef<Path>) -> QuillIndexResult<()> {
        let path = path.as_ref();
        if self.open_files.lock().contains(path) {
            return Err(QuillIndexError::FileOpen(path.display().to_string()));
        }
        std::fs::remove_file(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                QuillIndexError::FileNotFound(path.display().to_string())
            }
            _ => e.into(),
        })?;
        info!("destroyed paged file {:?}", path);
        Ok(())
    }

    pub fn open_file(&self, path: impl AsRef<Path>) -> QuillIndexResult<Arc<PagedFile>> {
        let path = path.as_ref();
        let mut open_files = self.open_files.lock();
        if open_files.contains(path) {
            return Err(QuillIndexError::FileOpen(path.display().to_string()));
        }
        let disk_manager = Arc::new(DiskManager::open(path)?);
        let pool = Arc::new(BufferPool::new(self.config, disk_manager));
        open_files.insert(path.to_path_buf());
        debug!(
            "opened paged file {:?} with {} buffer frames",
            path,
            pool.capacity()
        );

        Ok(Arc::new(PagedFile {
            path: path.to_path_buf(),
            pool,
            closed: AtomicBool::new(false),
            open_files: self.open_files.clone(),
        }))
    }

    /// Writes back every dirty page and closes the file. Fails with `PagePinned`
    /// while any page is still held, leaving the file open.
    pub fn close_file(&self, file: &PagedFile) -> QuillIndexResult<()> {
        file.close()
    }
}

/// An open paged file: page allocation and access through its buffer pool.
///
/// Every operation fails with `FileClosed` once the file has been closed.
#[derive(Debug)]
pub struct PagedFile {
    path: PathBuf,
    pool: Arc<BufferPool>,
    closed: AtomicBool,
    open_files: OpenFiles,
}

impl PagedFile {
    fn check_open(&self) -> QuillIndexResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QuillIndexError::FileClosed);
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn num_pages(&self) -> QuillIndexResult<u32> {
        self.check_open()?;
        Ok(self.pool.disk_manager().num_pages())
    }

    /// Appends a zeroed page and returns it pinned for writing.
    pub fn allocate_page(&self) -> QuillIndexResult<WritePageGuard> {
        self.check_open()?;
        self.pool.new_page()
    }

    pub fn fetch_page_read(&self, page_num: PageNum) -> QuillIndexResult<ReadPageGuard> {
        self.check_open()?;
        self.pool.fetch_page_read(page_num)
    }

    pub fn fetch_page_write(&self, page_num: PageNum) -> QuillIndexResult<WritePageGuard> {
        self.check_open()?;
        self.pool.fetch_page_write(page_num)
    }

    pub fn first_page_num(&self) -> QuillIndexResult<Option<PageNum>> {
        self.check_open()?;
        Ok((self.pool.disk_manager().num_pages() > 0).then_some(0))
    }

    /// Page following `current` in file order, or `None` at the end.
    pub fn next_page_num(&self, current: PageNum) -> QuillIndexResult<Option<PageNum>> {
        self.check_open()?;
        if current < 0 {
            return Err(QuillIndexError::InvalidPage(current));
        }
        let next = current + 1;
        Ok(((next as u32) < self.pool.disk_manager().num_pages()).then_some(next))
    }

    pub fn flush_page(&self, page_num: PageNum) -> QuillIndexResult<()> {
        self.check_open()?;
        self.pool.flush_page(page_num)?;
        Ok(())
    }

    pub fn flush_all_pages(&self) -> QuillIndexResult<()> {
        self.check_open()?;
        self.pool.flush_all_pages()
    }

    pub fn pinned_pages(&self) -> Vec<PageNum> {
        self.pool.pinned_pages()
    }

    fn close(&self) -> QuillIndexResult<()> {
        self.check_open()?;
        if let Some(page_num) = self.pool.pinned_pages().first() {
            return Err(QuillIndexError::PagePinned(*page_num));
        }
        self.pool.flush_all_pages()?;
        self.closed.store(true, Ordering::SeqCst);
        self.open_files.lock().remove(&self.path);
        debug!("closed paged file {:?}", self.path);
        Ok(())
    }
}

impl Drop for PagedFile {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.pool.flush_all_pages() {
            warn!("failed to flush {:?} on drop: {}", self.path, e);
        }
        self.open_files.lock().remove(&self.path);
    }
}
