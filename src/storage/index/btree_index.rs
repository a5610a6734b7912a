use log::{debug, info};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::buffer::{PageNum, WritePageGuard, INVALID_PAGE_NUM};
use crate::config::IndexConfig;
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::index::btree_iterator::{CompOp, IndexScan};
use crate::storage::index::btree_node::{
    bucket_page, reserve_split_pages, take_reserved, tree_page, SplitResult,
};
use crate::storage::key::{KeyKind, KeyRef};
use crate::storage::page::{RecordId, TreePage};
use crate::storage::paged_file::PagedFile;

/// An open B+-tree index mapping fixed-width keys to sets of RIDs.
///
/// Writers must be serialized by the caller; scans may run alongside deletes.
#[derive(Debug)]
pub struct IndexHandle {
    file: Arc<PagedFile>,
    root_page_num: AtomicI32,
    key_kind: KeyKind,
    key_width: usize,
    config: IndexConfig,
}

impl IndexHandle {
    /// Attaches to an index file by locating the node flagged as root.
    pub(crate) fn open(file: Arc<PagedFile>, config: IndexConfig) -> QuillIndexResult<Self> {
        let mut current = file.first_page_num()?;
        while let Some(page_num) = current {
            let root = {
                let guard = file.fetch_page_read(page_num)?;
                if TreePage::<&[u8]>::is_tree_page(guard.data()) {
                    let node = tree_page(page_num, &guard)?;
                    node.is_root()
                        .then(|| (node.key_kind(), node.key_width()))
                } else {
                    None
                }
            };
            if let Some((key_kind, key_width)) = root {
                info!(
                    "opened index {:?}: root page {}, {} keys of width {}",
                    file.path(),
                    page_num,
                    key_kind,
                    key_width
                );
                return Ok(Self {
                    file,
                    root_page_num: AtomicI32::new(page_num),
                    key_kind,
                    key_width,
                    config,
                });
            }
            current = file.next_page_num(page_num)?;
        }
        Err(QuillIndexError::Internal(format!(
            "index file {:?} has no root node",
            file.path()
        )))
    }

    pub fn file(&self) -> &Arc<PagedFile> {
        &self.file
    }

    pub fn root_page_num(&self) -> PageNum {
        self.root_page_num.load(Ordering::SeqCst)
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    pub fn key_width(&self) -> usize {
        self.key_width
    }

    fn check_key<'a>(&self, key: &'a [u8]) -> QuillIndexResult<KeyRef<'a>> {
        if key.len() != self.key_width {
            return Err(QuillIndexError::BadArguments(format!(
                "key of {} bytes does not match key width {}",
                key.len(),
                self.key_width
            )));
        }
        Ok(KeyRef::new(self.key_kind, key))
    }

    fn check_rid(rid: &RecordId) -> QuillIndexResult<()> {
        if rid.page_num < 0 || rid.slot_num < 0 {
            return Err(QuillIndexError::BadArguments(format!(
                "rid {} cannot be indexed",
                rid
            )));
        }
        Ok(())
    }

    /// Adds `rid` under `key`. Fails with `DuplicateEntry` if the pair is already indexed.
    /// RIDs with a negative component, [`RecordId::END`] included, are rejected.
    pub fn insert(&self, key: &[u8], rid: RecordId) -> QuillIndexResult<()> {
        let key = self.check_key(key)?;
        Self::check_rid(&rid)?;
        let root_num = self.root_page_num();
        let mut reserved = reserve_split_pages(&self.file, root_num, &key)?;
        let split = {
            let mut guard = self.file.fetch_page_write(root_num)?;
            tree_page(root_num, &mut guard)?.insert(&key, &rid, &self.file, &mut reserved)?
        };
        if let Some(split) = split {
            self.grow_root(root_num, split, take_reserved(&mut reserved)?)?;
        }
        Ok(())
    }

    /// Installs a new root, on a page reserved before the split, above the old
    /// root and its freshly split sibling.
    fn grow_root(
        &self,
        old_root: PageNum,
        split: SplitResult,
        mut guard: WritePageGuard,
    ) -> QuillIndexResult<()> {
        let new_root = guard.page_num();
        let mut root = TreePage::init(&mut guard, self.key_kind, self.key_width, true, false)?;
        root.set_child(0, old_root);
        root.add(0, split.separator.as_key_ref(), 1, split.sibling);
        self.root_page_num.store(new_root, Ordering::SeqCst);
        info!(
            "index root grew from page {} to page {} (separator {})",
            old_root, new_root, split.separator
        );
        Ok(())
    }

    /// Removes `rid` from under `key`. Fails with `RidNotFound` if the pair is not indexed.
    pub fn delete(&self, key: &[u8], rid: RecordId) -> QuillIndexResult<()> {
        let key = self.check_key(key)?;
        let root_num = self.root_page_num();
        let guard = self.file.fetch_page_read(root_num)?;
        tree_page(root_num, &guard)?.delete(&key, &rid, &self.file)
    }

    /// Opens a scan over the RIDs whose key satisfies `key <op> value`.
    /// `value` is ignored for `CompOp::NoOp` and required otherwise.
    pub fn scan(&self, op: CompOp, value: Option<&[u8]>) -> QuillIndexResult<IndexScan> {
        IndexScan::new(
            self.file.clone(),
            self.root_page_num(),
            self.key_kind,
            self.key_width,
            op,
            value,
            self.config.scan_seek_enable,
        )
    }

    /// Writes every dirty page of the index to disk.
    pub fn force_pages(&self) -> QuillIndexResult<()> {
        self.file.flush_all_pages()
    }

    pub fn force_page(&self, page_num: PageNum) -> QuillIndexResult<()> {
        self.file.flush_page(page_num)
    }

    /// Renders the tree as Graphviz dot: nodes top-down, leaf links dashed, and
    /// the RID count of every leaf key.
    pub fn to_dot(&self) -> QuillIndexResult<String> {
        let mut dot = String::new();
        dot.push_str("digraph BPlusTree {\n");
        dot.push_str("  rankdir=TB;\n");
        dot.push_str("  node [shape=record, height=.1];\n");

        let mut queue = VecDeque::new();
        queue.push_back(self.root_page_num());
        while let Some(page_num) = queue.pop_front() {
            let guard = self.file.fetch_page_read(page_num)?;
            let node = tree_page(page_num, &guard)?;
            let mut fields = Vec::with_capacity(node.key_count() + 1);
            if node.is_leaf() {
                for i in 0..node.key_count() {
                    let rids = self.chain_len(node.bucket_at(i))?;
                    fields.push(format!(
                        "<f{}> {} ({})",
                        i,
                        escape_label(&node.key_at(i).to_string()),
                        rids
                    ));
                }
                dot.push_str(&format!(
                    "  page{} [label=\"{}\"];\n",
                    page_num,
                    fields.join("|")
                ));
                let next = node.next_leaf();
                if next != INVALID_PAGE_NUM {
                    dot.push_str(&format!(
                        "  page{} -> page{} [style=dashed];\n",
                        page_num, next
                    ));
                }
            } else {
                for i in 0..=node.key_count() {
                    if i < node.key_count() {
                        fields.push(format!(
                            "<p{}>|{}",
                            i,
                            escape_label(&node.key_at(i).to_string())
                        ));
                    } else {
                        fields.push(format!("<p{}>", i));
                    }
                    dot.push_str(&format!(
                        "  page{}:p{} -> page{};\n",
                        page_num,
                        i,
                        node.child_at(i)
                    ));
                    queue.push_back(node.child_at(i));
                }
                dot.push_str(&format!(
                    "  page{} [label=\"{}\"];\n",
                    page_num,
                    fields.join("|")
                ));
            }
        }
        dot.push_str("}\n");
        debug!("rendered index {:?} as dot", self.file.path());
        Ok(dot)
    }

    fn chain_len(&self, head: PageNum) -> QuillIndexResult<usize> {
        let mut count = 0;
        let mut current = head;
        while current != INVALID_PAGE_NUM {
            let guard = self.file.fetch_page_read(current)?;
            let bucket = bucket_page(current, &guard)?;
            count += bucket.rid_count();
            current = bucket.next_bucket();
        }
        Ok(count)
    }
}

/// Escapes the characters that are structural inside a record label.
fn escape_label(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '|' | '{' | '}' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
