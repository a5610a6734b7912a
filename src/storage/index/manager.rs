use log::info;
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::index::btree_index::IndexHandle;
use crate::storage::key::KeyKind;
use crate::storage::page::TreePage;
use crate::storage::paged_file::PagedFileManager;

/// Creates, destroys, opens and closes indexes. Index `n` of a data file
/// `file_name` lives in its own paged file `<file_name>.<n>`.
#[derive(Debug)]
pub struct IndexManager {
    file_manager: PagedFileManager,
    config: IndexConfig,
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl IndexManager {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            file_manager: PagedFileManager::new(config.buffer_pool),
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn index_file_name(file_name: impl AsRef<Path>, index_no: i32) -> PathBuf {
        let mut name = file_name.as_ref().as_os_str().to_owned();
        name.push(format!(".{}", index_no));
        PathBuf::from(name)
    }

    fn check_index_no(index_no: i32) -> QuillIndexResult<()> {
        if index_no < 0 {
            return Err(QuillIndexError::BadArguments(format!(
                "index number {} is negative",
                index_no
            )));
        }
        Ok(())
    }

    /// Creates an empty index whose root is a leaf on the first page.
    /// Arguments are validated before the file is touched.
    pub fn create_index(
        &self,
        file_name: impl AsRef<Path>,
        index_no: i32,
        key_kind: KeyKind,
        key_width: usize,
    ) -> QuillIndexResult<()> {
        Self::check_index_no(index_no)?;
        key_kind.validate_width(key_width)?;

        let path = Self::index_file_name(file_name, index_no);
        self.file_manager.create_file(&path)?;
        let file = self.file_manager.open_file(&path)?;
        {
            let mut guard = file.allocate_page()?;
            TreePage::init(&mut guard, key_kind, key_width, true, true)?;
        }
        self.file_manager.close_file(&file)?;
        info!(
            "created index {:?} on {} keys of width {}",
            path, key_kind, key_width
        );
        Ok(())
    }

    pub fn destroy_index(&self, file_name: impl AsRef<Path>, index_no: i32) -> QuillIndexResult<()> {
        Self::check_index_no(index_no)?;
        self.file_manager
            .destroy_file(Self::index_file_name(file_name, index_no))
    }

    pub fn open_index(
        &self,
        file_name: impl AsRef<Path>,
        index_no: i32,
    ) -> QuillIndexResult<IndexHandle> {
        Self::check_index_no(index_no)?;
        let file = self
            .file_manager
            .open_file(Self::index_file_name(file_name, index_no))?;
        IndexHandle::open(file, self.config)
    }

    /// Flushes and closes the index file. Later operations through the handle
    /// or its scans fail with `FileClosed`.
    pub fn close_index(&self, handle: &IndexHandle) -> QuillIndexResult<()> {
        self.file_manager.close_file(handle.file())
    }
}
