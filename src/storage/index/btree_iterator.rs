use std::sync::Arc;

use strum::{Display, EnumIter};

use crate::buffer::{PageNum, INVALID_PAGE_NUM};
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::index::btree_node::{bucket_page, find_leaf, tree_page};
use crate::storage::key::{IndexKey, KeyKind, KeyRef};
use crate::storage::page::RecordId;
use crate::storage::paged_file::PagedFile;

/// Scan predicate, applied as `tree_key <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum CompOp {
    NoOp,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompOp {
    pub fn matches(&self, tree_key: &KeyRef<'_>, value: &KeyRef<'_>) -> bool {
        match self {
            CompOp::NoOp => true,
            CompOp::Eq => tree_key == value,
            CompOp::Ne => tree_key != value,
            CompOp::Lt => tree_key < value,
            CompOp::Gt => tree_key > value,
            CompOp::Le => tree_key <= value,
            CompOp::Ge => tree_key >= value,
        }
    }

    /// Whether no key at or after `tree_key` can match, given ascending key order.
    fn is_exhausted(&self, tree_key: &KeyRef<'_>, value: &KeyRef<'_>) -> bool {
        match self {
            CompOp::Eq | CompOp::Le => tree_key > value,
            CompOp::Lt => tree_key >= value,
            CompOp::NoOp | CompOp::Ne | CompOp::Gt | CompOp::Ge => false,
        }
    }

    fn seeks(&self) -> bool {
        matches!(self, CompOp::Eq | CompOp::Ge | CompOp::Gt)
    }
}

/// Cursor over the RIDs whose key satisfies a predicate, in key order and, per
/// key, in bucket chain order.
///
/// The position is `(leaf, key_index, bucket, rid_slot)`. No page stays pinned
/// between calls, so entries may be deleted through the index while a scan is
/// open; a deleted entry the cursor has not reached yet is skipped.
#[derive(Debug)]
pub struct IndexScan {
    file: Arc<PagedFile>,
    op: CompOp,
    value: Option<IndexKey>,
    stop_early: bool,
    leaf: PageNum,
    key_index: usize,
    bucket: PageNum,
    rid_slot: usize,
    done: bool,
}

impl IndexScan {
    pub(crate) fn new(
        file: Arc<PagedFile>,
        root: PageNum,
        key_kind: KeyKind,
        key_width: usize,
        op: CompOp,
        value: Option<&[u8]>,
        seek_enable: bool,
    ) -> QuillIndexResult<Self> {
        let value = match (op, value) {
            (CompOp::NoOp, _) => None,
            (_, None) => {
                return Err(QuillIndexError::BadArguments(format!(
                    "{} scan needs a value",
                    op
                )))
            }
            (_, Some(bytes)) => {
                if bytes.len() != key_width {
                    return Err(QuillIndexError::BadArguments(format!(
                        "scan value of {} bytes does not match key width {}",
                        bytes.len(),
                        key_width
                    )));
                }
                Some(IndexKey::from_bytes(key_kind, bytes)?)
            }
        };

        let (leaf, key_index) = match &value {
            Some(value) if seek_enable && op.seeks() => {
                let key = value.as_key_ref();
                let leaf = find_leaf(&file, root, Some(&key))?;
                let guard = file.fetch_page_read(leaf)?;
                let key_index = tree_page(leaf, &guard)?.search(&key);
                (leaf, key_index)
            }
            _ => (find_leaf(&file, root, None)?, 0),
        };

        Ok(Self {
            file,
            op,
            value,
            stop_early: seek_enable,
            leaf,
            key_index,
            bucket: INVALID_PAGE_NUM,
            rid_slot: 0,
            done: false,
        })
    }

    pub fn op(&self) -> CompOp {
        self.op
    }

    /// Next matching RID, or [`RecordId::END`] once the scan is exhausted.
    pub fn next_entry(&mut self) -> QuillIndexResult<RecordId> {
        loop {
            if self.done {
                return Ok(RecordId::END);
            }

            if self.bucket != INVALID_PAGE_NUM {
                let guard = self.file.fetch_page_read(self.bucket)?;
                let bucket = bucket_page(self.bucket, &guard)?;
                if let Some(slot) = bucket.next_live_slot(self.rid_slot) {
                    self.rid_slot = slot + 1;
                    return Ok(bucket.rid_at(slot));
                }
                self.bucket = bucket.next_bucket();
                self.rid_slot = 0;
                if self.bucket == INVALID_PAGE_NUM {
                    self.key_index += 1;
                }
                continue;
            }

            if self.leaf == INVALID_PAGE_NUM {
                self.done = true;
                continue;
            }
            let guard = self.file.fetch_page_read(self.leaf)?;
            let leaf = tree_page(self.leaf, &guard)?;
            if self.key_index >= leaf.key_count() {
                self.leaf = leaf.next_leaf();
                self.key_index = 0;
                continue;
            }

            let tree_key = leaf.key_at(self.key_index);
            let Some(value) = &self.value else {
                self.bucket = leaf.bucket_at(self.key_index);
                continue;
            };
            let value = value.as_key_ref();
            if self.op.matches(&tree_key, &value) {
                self.bucket = leaf.bucket_at(self.key_index);
            } else if self.stop_early && self.op.is_exhausted(&tree_key, &value) {
                self.done = true;
            } else {
                self.key_index += 1;
            }
        }
    }

    /// Ends the scan; later calls return [`RecordId::END`].
    pub fn close(&mut self) {
        self.done = true;
    }
}

impl Iterator for IndexScan {
    type Item = QuillIndexResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(rid) if rid.is_end() => None,
            Ok(rid) => Some(Ok(rid)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
