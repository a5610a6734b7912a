//! Recursive insert and delete over tree nodes and their overflow bucket chains.

use log::{debug, trace};

use crate::buffer::{PageNum, WritePageGuard, INVALID_PAGE_NUM};
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::key::{IndexKey, KeyRef};
use crate::storage::page::{BucketPage, RecordId, TreePage};
use crate::storage::paged_file::PagedFile;

/// Reported by a node that split: `separator` goes into the parent with
/// `sibling` as its right child.
#[derive(Debug)]
pub struct SplitResult {
    pub separator: IndexKey,
    pub sibling: PageNum,
}

pub(crate) fn tree_page<B: AsRef<[u8]>>(page_num: PageNum, data: B) -> QuillIndexResult<TreePage<B>> {
    TreePage::new(data).map_err(|e| QuillIndexError::CorruptPage {
        page: page_num,
        reason: e.to_string(),
    })
}

pub(crate) fn bucket_page<B: AsRef<[u8]>>(
    page_num: PageNum,
    data: B,
) -> QuillIndexResult<BucketPage<B>> {
    BucketPage::new(data).map_err(|e| QuillIndexError::CorruptPage {
        page: page_num,
        reason: e.to_string(),
    })
}

/// Leaf reached from `root` by following `key`, or the leftmost leaf when `key` is `None`.
pub(crate) fn find_leaf(
    file: &PagedFile,
    root: PageNum,
    key: Option<&KeyRef<'_>>,
) -> QuillIndexResult<PageNum> {
    let mut current = root;
    loop {
        let guard = file.fetch_page_read(current)?;
        let node = tree_page(current, &guard)?;
        if node.is_leaf() {
            return Ok(current);
        }
        current = match key {
            Some(key) => node.child_at(node.search(key)),
            None => node.child_at(0),
        };
    }
}

/// Allocates every page that inserting `key` will need for node splits: one
/// sibling per full node on the trailing run of full nodes above the leaf, plus
/// a new root when that run reaches the root. The pages stay pinned so that
/// nothing can fail once a node has been modified.
pub(crate) fn reserve_split_pages(
    file: &PagedFile,
    root: PageNum,
    key: &KeyRef<'_>,
) -> QuillIndexResult<Vec<WritePageGuard>> {
    let mut depth = 0;
    let mut full_run = 0;
    let mut current = root;
    loop {
        let guard = file.fetch_page_read(current)?;
        let node = tree_page(current, &guard)?;
        depth += 1;
        full_run = if node.is_full() { full_run + 1 } else { 0 };
        if node.is_leaf() {
            if !node.is_full() || node.find_key(key).is_some() {
                return Ok(Vec::new());
            }
            break;
        }
        current = node.child_at(node.search(key));
    }

    let needed = if full_run == depth { full_run + 1 } else { full_run };
    let mut reserved = Vec::with_capacity(needed);
    for _ in 0..needed {
        reserved.push(file.allocate_page()?);
    }
    trace!("reserved {} pages for splits", needed);
    Ok(reserved)
}

pub(crate) fn take_reserved(
    reserved: &mut Vec<WritePageGuard>,
) -> QuillIndexResult<WritePageGuard> {
    reserved
        .pop()
        .ok_or_else(|| QuillIndexError::Internal("no page reserved for split".to_string()))
}

fn new_bucket(file: &PagedFile, rid: &RecordId) -> QuillIndexResult<PageNum> {
    let mut guard = file.allocate_page()?;
    let page_num = guard.page_num();
    let mut bucket = BucketPage::init(&mut guard, INVALID_PAGE_NUM);
    bucket.add(rid);
    trace!("new bucket {} for {}", page_num, rid);
    Ok(page_num)
}

/// Adds `rid` to the chain starting at `head`: into the first bucket with a
/// free slot, or into a new bucket linked after the tail.
fn append_to_chain(file: &PagedFile, head: PageNum, rid: &RecordId) -> QuillIndexResult<()> {
    let mut first_free = None;
    let mut tail = head;
    let mut current = head;
    while current != INVALID_PAGE_NUM {
        let guard = file.fetch_page_read(current)?;
        let bucket = bucket_page(current, &guard)?;
        if bucket.find(rid).is_some() {
            return Err(QuillIndexError::DuplicateEntry(*rid));
        }
        if first_free.is_none() && !bucket.is_full() {
            first_free = Some(current);
        }
        tail = current;
        current = bucket.next_bucket();
    }

    match first_free {
        Some(page_num) => {
            let mut guard = file.fetch_page_write(page_num)?;
            let mut bucket = bucket_page(page_num, &mut guard)?;
            if bucket.add(rid).is_none() {
                return Err(QuillIndexError::Internal(format!(
                    "bucket {} filled up during insert",
                    page_num
                )));
            }
        }
        None => {
            let new_page = new_bucket(file, rid)?;
            let mut guard = file.fetch_page_write(tail)?;
            bucket_page(tail, &mut guard)?.set_next_bucket(new_page);
            debug!("chained bucket {} after {}", new_page, tail);
        }
    }
    Ok(())
}

fn remove_from_chain(file: &PagedFile, head: PageNum, rid: &RecordId) -> QuillIndexResult<()> {
    let mut current = head;
    while current != INVALID_PAGE_NUM {
        let mut guard = file.fetch_page_write(current)?;
        let mut bucket = bucket_page(current, &mut guard)?;
        if bucket.remove(rid) {
            return Ok(());
        }
        current = bucket.next_bucket();
    }
    Err(QuillIndexError::RidNotFound(*rid))
}

impl<B: AsRef<[u8]>> TreePage<B> {
    /// Removes `rid` from the bucket chain of `key`. Nodes are never merged or
    /// rebalanced, and keys whose chain becomes empty stay in place.
    pub fn delete(
        &self,
        key: &KeyRef<'_>,
        rid: &RecordId,
        file: &PagedFile,
    ) -> QuillIndexResult<()> {
        if self.is_leaf() {
            let Some(index) = self.find_key(key) else {
                return Err(QuillIndexError::RidNotFound(*rid));
            };
            return remove_from_chain(file, self.bucket_at(index), rid);
        }
        let child_num = self.child_at(self.search(key));
        let guard = file.fetch_page_read(child_num)?;
        tree_page(child_num, &guard)?.delete(key, rid, file)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreePage<B> {
    /// Inserts `(key, rid)` below this node. Returns the separator and new
    /// sibling when this node had to split.
    ///
    /// Split siblings come from `reserved`, filled by [`reserve_split_pages`],
    /// so the only fallible steps run before any node is modified. Pages
    /// allocated ahead of a failure are not reclaimed.
    pub fn insert(
        &mut self,
        key: &KeyRef<'_>,
        rid: &RecordId,
        file: &PagedFile,
        reserved: &mut Vec<WritePageGuard>,
    ) -> QuillIndexResult<Option<SplitResult>> {
        if self.is_leaf() {
            self.insert_into_leaf(key, rid, file, reserved)
        } else {
            self.insert_into_internal(key, rid, file, reserved)
        }
    }

    fn insert_into_leaf(
        &mut self,
        key: &KeyRef<'_>,
        rid: &RecordId,
        file: &PagedFile,
        reserved: &mut Vec<WritePageGuard>,
    ) -> QuillIndexResult<Option<SplitResult>> {
        let index = self.search(key);
        if index < self.key_count() && self.key_at(index) == *key {
            append_to_chain(file, self.bucket_at(index), rid)?;
            return Ok(None);
        }

        let bucket = new_bucket(file, rid)?;
        if !self.is_full() {
            self.add(index, *key, index, bucket);
            return Ok(None);
        }

        let mut sibling_guard = take_reserved(reserved)?;
        let sibling_num = sibling_guard.page_num();
        let mut sibling = TreePage::init(
            &mut sibling_guard,
            self.key_kind(),
            self.key_width(),
            false,
            true,
        )?;

        let half = self.max_keys() / 2;
        self.transfer_keys(&mut sibling, half);
        self.set_next_leaf(sibling_num);
        if index < half {
            self.add(index, *key, index, bucket);
        } else {
            sibling.add(index - half, *key, index - half, bucket);
        }
        // copied up, the separator also stays in this leaf
        let separator = self.key_at(self.key_count() - 1).to_owned_key();
        debug!(
            "split leaf into {} keys and {} keys in leaf {}, separator {}",
            self.key_count(),
            sibling.key_count(),
            sibling_num,
            separator
        );

        Ok(Some(SplitResult {
            separator,
            sibling: sibling_num,
        }))
    }

    fn insert_into_internal(
        &mut self,
        key: &KeyRef<'_>,
        rid: &RecordId,
        file: &PagedFile,
        reserved: &mut Vec<WritePageGuard>,
    ) -> QuillIndexResult<Option<SplitResult>> {
        let index = self.search(key);
        let child_num = self.child_at(index);
        let split = {
            let mut child_guard = file.fetch_page_write(child_num)?;
            tree_page(child_num, &mut child_guard)?.insert(key, rid, file, reserved)?
        };
        let Some(SplitResult { separator, sibling }) = split else {
            return Ok(None);
        };

        if !self.is_full() {
            self.add(index, separator.as_key_ref(), index + 1, sibling);
            return Ok(None);
        }

        let mut new_guard = take_reserved(reserved)?;
        let new_num = new_guard.page_num();
        let mut new_node = TreePage::init(
            &mut new_guard,
            self.key_kind(),
            self.key_width(),
            false,
            false,
        )?;

        let half = self.max_keys() / 2;
        if index > half {
            self.transfer_keys(&mut new_node, half - 1);
            new_node.add(index - half - 1, separator.as_key_ref(), index - half, sibling);
        } else {
            self.transfer_keys(&mut new_node, half);
            self.add(index, separator.as_key_ref(), index + 1, sibling);
            new_node.set_child(0, self.child_at(half + 1));
        }
        // moved up, not copied: the last key leaves this node along with its right child
        let promoted = self.pop_key();
        debug!(
            "split internal node into {} keys and {} keys in node {}, promoted {}",
            self.key_count(),
            new_node.key_count(),
            new_num,
            promoted
        );

        Ok(Some(SplitResult {
            separator: promoted,
            sibling: new_num,
        }))
    }
}
