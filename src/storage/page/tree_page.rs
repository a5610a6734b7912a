use crate::buffer::{PageNum, INVALID_PAGE_NUM, PAGE_SIZE};
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::codec::TreePageHeaderCodec;
use crate::storage::key::{IndexKey, KeyKind, KeyRef};
use crate::storage::page::TypedArray;

pub const TREE_PAGE_TAG: u32 = 0x5149_4e44;
pub const TREE_PAGE_HEADER_SIZE: usize = 20;

const PAGE_NUM_WIDTH: usize = 4;
const KEY_COUNT_OFFSET: usize = 4;
const IS_ROOT_OFFSET: usize = 16;
const IS_LEAF_OFFSET: usize = 17;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TreePageHeader {
    pub key_count: i32,
    pub key_width: i32,
    pub key_kind: KeyKind,
    pub is_root: bool,
    pub is_leaf: bool,
}

/// Largest even key count whose keys and `max_keys + 1` child slots fit in a page.
pub const fn max_keys_for(key_width: usize) -> usize {
    ((PAGE_SIZE - TREE_PAGE_HEADER_SIZE - PAGE_NUM_WIDTH) / (key_width + PAGE_NUM_WIDTH)) & !1
}

/// Tree node layout over one page buffer:
///
/// ```text
/// | header (20) | keys[max_keys] | children[max_keys + 1] |
/// ```
///
/// An internal node with `n` keys has `n + 1` children, child `i` covering keys
/// `<= keys[i]` and `> keys[i - 1]`. A leaf stores the head overflow bucket of
/// `keys[i]` in child slot `i` and the next leaf in slot `n`, so both kinds keep
/// exactly `key_count + 1` child slots in use.
#[derive(Debug)]
pub struct TreePage<B> {
    data: B,
    key_kind: KeyKind,
    key_width: usize,
    max_keys: usize,
}

impl<B: AsRef<[u8]>> TreePage<B> {
    pub fn new(data: B) -> QuillIndexResult<Self> {
        let (header, _) = TreePageHeaderCodec::decode(data.as_ref())?;
        let key_width = header.key_width as usize;
        header.key_kind.validate_width(key_width)?;
        let max_keys = max_keys_for(key_width);
        if header.key_count < 0 || header.key_count as usize > max_keys {
            return Err(QuillIndexError::Internal(format!(
                "key count {} outside node capacity {}",
                header.key_count, max_keys
            )));
        }
        Ok(Self {
            data,
            key_kind: header.key_kind,
            key_width,
            max_keys,
        })
    }

    pub fn is_tree_page(bytes: &[u8]) -> bool {
        TreePageHeaderCodec::decode(bytes).is_ok()
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    pub fn key_width(&self) -> usize {
        self.key_width
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn key_count(&self) -> usize {
        let bytes = self.data.as_ref();
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[KEY_COUNT_OFFSET..KEY_COUNT_OFFSET + 4]);
        i32::from_be_bytes(buf) as usize
    }

    pub fn is_root(&self) -> bool {
        self.data.as_ref()[IS_ROOT_OFFSET] != 0
    }

    pub fn is_leaf(&self) -> bool {
        self.data.as_ref()[IS_LEAF_OFFSET] != 0
    }

    pub fn is_full(&self) -> bool {
        self.key_count() == self.max_keys
    }

    fn keys_end(&self) -> usize {
        TREE_PAGE_HEADER_SIZE + self.max_keys * self.key_width
    }

    pub fn keys(&self) -> TypedArray<&[u8]> {
        TypedArray::new(
            &self.data.as_ref()[TREE_PAGE_HEADER_SIZE..self.keys_end()],
            self.key_kind,
            self.key_width,
            self.key_count(),
            self.max_keys,
        )
    }

    pub fn children(&self) -> TypedArray<&[u8]> {
        let start = self.keys_end();
        TypedArray::new(
            &self.data.as_ref()[start..start + (self.max_keys + 1) * PAGE_NUM_WIDTH],
            KeyKind::Int,
            PAGE_NUM_WIDTH,
            self.key_count() + 1,
            self.max_keys + 1,
        )
    }

    pub fn key_at(&self, index: usize) -> KeyRef<'_> {
        let start = TREE_PAGE_HEADER_SIZE + index * self.key_width;
        assert!(
            index < self.key_count(),
            "key index {} out of bounds for {} keys",
            index,
            self.key_count()
        );
        KeyRef::new(self.key_kind, &self.data.as_ref()[start..start + self.key_width])
    }

    pub fn child_at(&self, index: usize) -> PageNum {
        self.children().get(index).as_i32()
    }

    /// Head of the overflow bucket chain of leaf key `index`.
    pub fn bucket_at(&self, index: usize) -> PageNum {
        assert!(self.is_leaf(), "buckets only hang off leaves");
        assert!(
            index < self.key_count(),
            "key index {} out of bounds for {} keys",
            index,
            self.key_count()
        );
        self.child_at(index)
    }

    pub fn next_leaf(&self) -> PageNum {
        assert!(self.is_leaf(), "only leaves are chained");
        self.child_at(self.key_count())
    }

    /// First slot whose key is `>= key`, or `key_count()` when all keys are smaller.
    /// Equal keys route to their first occurrence.
    pub fn search(&self, key: &KeyRef<'_>) -> usize {
        self.keys().lower_bound(key)
    }

    pub fn find_key(&self, key: &KeyRef<'_>) -> Option<usize> {
        let index = self.search(key);
        (index < self.key_count() && self.key_at(index) == *key).then_some(index)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreePage<B> {
    /// Formats `data` as an empty node. Child slot 0 starts out invalid, which
    /// doubles as the next-leaf link of an empty leaf.
    pub fn init(
        mut data: B,
        key_kind: KeyKind,
        key_width: usize,
        is_root: bool,
        is_leaf: bool,
    ) -> QuillIndexResult<Self> {
        key_kind.validate_width(key_width)?;
        let header = TreePageHeader {
            key_count: 0,
            key_width: key_width as i32,
            key_kind,
            is_root,
            is_leaf,
        };
        let encoded = TreePageHeaderCodec::encode(&header);
        data.as_mut()[..encoded.len()].copy_from_slice(&encoded);
        let mut page = Self {
            data,
            key_kind,
            key_width,
            max_keys: max_keys_for(key_width),
        };
        page.set_child(0, INVALID_PAGE_NUM);
        Ok(page)
    }

    fn set_key_count(&mut self, key_count: usize) {
        self.data.as_mut()[KEY_COUNT_OFFSET..KEY_COUNT_OFFSET + 4]
            .copy_from_slice(&(key_count as i32).to_be_bytes());
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.data.as_mut()[IS_ROOT_OFFSET] = is_root as u8;
    }

    fn keys_mut(&mut self) -> TypedArray<&mut [u8]> {
        let end = self.keys_end();
        let (kind, width, len, max) = (
            self.key_kind,
            self.key_width,
            self.key_count(),
            self.max_keys,
        );
        TypedArray::new(
            &mut self.data.as_mut()[TREE_PAGE_HEADER_SIZE..end],
            kind,
            width,
            len,
            max,
        )
    }

    fn children_mut(&mut self) -> TypedArray<&mut [u8]> {
        let start = self.keys_end();
        let (len, max) = (self.key_count() + 1, self.max_keys + 1);
        TypedArray::new(
            &mut self.data.as_mut()[start..start + max * PAGE_NUM_WIDTH],
            KeyKind::Int,
            PAGE_NUM_WIDTH,
            len,
            max,
        )
    }

    pub fn set_child(&mut self, index: usize, page_num: PageNum) {
        let value = IndexKey::from_i32(page_num);
        self.children_mut().set(index, value.as_key_ref());
    }

    pub fn set_next_leaf(&mut self, page_num: PageNum) {
        assert!(self.is_leaf(), "only leaves are chained");
        let slot = self.key_count();
        self.set_child(slot, page_num);
    }

    /// Inserts `key` at key slot `key_index` and `child` at child slot `child_index`.
    pub fn add(&mut self, key_index: usize, key: KeyRef<'_>, child_index: usize, child: PageNum) {
        assert!(!self.is_full(), "node is full at {} keys", self.max_keys);
        let count = self.key_count();
        self.keys_mut().insert(key_index, key);
        let child = IndexKey::from_i32(child);
        self.children_mut().insert(child_index, child.as_key_ref());
        self.set_key_count(count + 1);
    }

    /// Removes the last key together with the last child slot and returns the key.
    pub fn pop_key(&mut self) -> IndexKey {
        let count = self.key_count();
        let key = self.keys_mut().pop();
        self.children_mut().pop();
        self.set_key_count(count - 1);
        key
    }

    /// Moves the upper `n` keys of this full node, with their right children,
    /// into the empty `sibling`. The child left of the first moved key becomes the
    /// sibling's child 0 and also stays behind as this node's last child slot.
    pub fn transfer_keys<C: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        sibling: &mut TreePage<C>,
        n: usize,
    ) {
        assert!(self.is_full(), "only full nodes give away keys");
        assert_eq!(sibling.key_count(), 0, "sibling must be empty");
        assert!(n > 0 && n < self.max_keys, "cannot move {} keys", n);
        self.set_is_root(false);

        let first = self.max_keys - n;
        sibling.set_child(0, self.child_at(first));
        for j in 0..n {
            sibling.add(
                j,
                self.key_at(first + j),
                j + 1,
                self.child_at(first + j + 1),
            );
        }
        while self.key_count() > first {
            self.pop_key();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_leaf(buf: &mut [u8]) -> TreePage<&mut [u8]> {
        TreePage::init(buf, KeyKind::Int, 4, false, true).unwrap()
    }

    fn keys_of<B: AsRef<[u8]>>(page: &TreePage<B>) -> Vec<i32> {
        page.keys().iter().map(|k| k.as_i32()).collect()
    }

    fn children_of<B: AsRef<[u8]>>(page: &TreePage<B>) -> Vec<PageNum> {
        page.children().iter().map(|k| k.as_i32()).collect()
    }

    #[test]
    fn capacity_matches_layout() {
        assert_eq!(max_keys_for(4), 508);
        assert_eq!(max_keys_for(255) % 2, 0);
        let w = 255;
        let m = max_keys_for(w);
        assert!(TREE_PAGE_HEADER_SIZE + m * w + (m + 1) * 4 <= PAGE_SIZE);
    }

    #[test]
    fn init_and_reopen() {
        let mut buf = vec![0u8; PAGE_SIZE];
        {
            let mut page = TreePage::init(&mut buf[..], KeyKind::Str, 8, true, true).unwrap();
            page.add(0, IndexKey::from_str("k", 8).unwrap().as_key_ref(), 0, 11);
        }
        let page = TreePage::new(&buf[..]).unwrap();
        assert!(page.is_root());
        assert!(page.is_leaf());
        assert_eq!(page.key_count(), 1);
        assert_eq!(page.key_width(), 8);
        assert_eq!(page.bucket_at(0), 11);
        assert_eq!(page.next_leaf(), INVALID_PAGE_NUM);
        assert!(TreePage::<&[u8]>::is_tree_page(&buf));
        assert!(!TreePage::<&[u8]>::is_tree_page(&[0u8; PAGE_SIZE]));
    }

    #[test]
    fn key_count_beyond_capacity_is_rejected() {
        let mut buf = vec![0u8; PAGE_SIZE];
        TreePage::init(&mut buf[..], KeyKind::Int, 4, false, true).unwrap();
        for bad in [509i32, -1] {
            buf[4..8].copy_from_slice(&bad.to_be_bytes());
            assert!(TreePage::new(&buf[..]).is_err());
        }
        buf[4..8].copy_from_slice(&508i32.to_be_bytes());
        assert_eq!(TreePage::new(&buf[..]).unwrap().key_count(), 508);
    }

    #[test]
    fn add_keeps_next_leaf_last() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut leaf = int_leaf(&mut buf);
        leaf.set_next_leaf(99);
        leaf.add(0, IndexKey::from_i32(20).as_key_ref(), 0, 2);
        leaf.add(0, IndexKey::from_i32(10).as_key_ref(), 0, 1);
        leaf.add(2, IndexKey::from_i32(30).as_key_ref(), 2, 3);
        assert_eq!(keys_of(&leaf), vec![10, 20, 30]);
        assert_eq!(children_of(&leaf), vec![1, 2, 3, 99]);
        assert_eq!(leaf.next_leaf(), 99);

        let key = IndexKey::from_i32(20);
        assert_eq!(leaf.search(&key.as_key_ref()), 1);
        assert_eq!(leaf.find_key(&key.as_key_ref()), Some(1));
        assert_eq!(leaf.find_key(&IndexKey::from_i32(25).as_key_ref()), None);
        assert_eq!(leaf.search(&IndexKey::from_i32(31).as_key_ref()), 3);

        assert_eq!(leaf.pop_key(), IndexKey::from_i32(30));
        assert_eq!(children_of(&leaf), vec![1, 2, 3]);
    }

    #[test]
    fn transfer_keys_splits_children() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut sib_buf = vec![0u8; PAGE_SIZE];
        let mut node = TreePage::init(&mut buf[..], KeyKind::Int, 4, true, false).unwrap();
        let max = node.max_keys();
        node.set_child(0, 1000);
        for i in 0..max {
            node.add(i, IndexKey::from_i32(i as i32).as_key_ref(), i + 1, 1001 + i as i32);
        }
        assert!(node.is_full());

        let mut sibling = TreePage::init(&mut sib_buf[..], KeyKind::Int, 4, false, false).unwrap();
        node.transfer_keys(&mut sibling, 3);

        assert!(!node.is_root());
        assert_eq!(node.key_count(), max - 3);
        assert_eq!(node.child_at(max - 3), 1000 + (max - 3) as i32);
        assert_eq!(keys_of(&sibling), vec![max as i32 - 3, max as i32 - 2, max as i32 - 1]);
        assert_eq!(
            children_of(&sibling),
            (max - 3..=max).map(|c| 1000 + c as i32).collect::<Vec<_>>()
        );
    }

    #[test]
    fn rejects_bad_width() {
        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(TreePage::init(&mut buf[..], KeyKind::Int, 8, false, true).is_err());
        assert!(TreePage::init(&mut buf[..], KeyKind::Str, 0, false, true).is_err());
    }
}
