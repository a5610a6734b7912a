use crate::storage::key::{IndexKey, KeyKind, KeyRef};

/// Fixed-capacity sequence of same-kind, fixed-width keys laid out back to
/// back in a caller-owned buffer.
///
/// The array does not persist its own length; the owner reads it from its page
/// header when building the view and writes `len()` back after mutating.
/// Out-of-range indexes and kind or width mismatches panic, the same way slice
/// indexing does.
#[derive(Debug)]
pub struct TypedArray<B> {
    data: B,
    kind: KeyKind,
    width: usize,
    len: usize,
    max_len: usize,
}

impl<B: AsRef<[u8]>> TypedArray<B> {
    pub fn new(data: B, kind: KeyKind, width: usize, len: usize, max_len: usize) -> Self {
        assert!(
            data.as_ref().len() >= width * max_len,
            "buffer of {} bytes cannot hold {} elements of width {}",
            data.as_ref().len(),
            max_len,
            width
        );
        assert!(len <= max_len, "length {} exceeds capacity {}", len, max_len);
        Self {
            data,
            kind,
            width,
            len,
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.max_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, index: usize) -> KeyRef<'_> {
        assert!(
            index < self.len,
            "index {} out of bounds for length {}",
            index,
            self.len
        );
        let start = index * self.width;
        KeyRef::new(self.kind, &self.data.as_ref()[start..start + self.width])
    }

    /// Index of the first element `>= key`, or `len()` when every element is smaller.
    pub fn lower_bound(&self, key: &KeyRef<'_>) -> usize {
        (0..self.len)
            .find(|i| *key <= self.get(*i))
            .unwrap_or(self.len)
    }

    pub fn iter(&self) -> impl Iterator<Item = KeyRef<'_>> {
        (0..self.len).map(move |i| self.get(i))
    }

    fn check_value(&self, value: &KeyRef<'_>) {
        assert!(
            value.kind() == self.kind && value.width() == self.width,
            "cannot store {} key of width {} in {} array of width {}",
            value.kind(),
            value.width(),
            self.kind,
            self.width
        );
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TypedArray<B> {
    pub fn set(&mut self, index: usize, value: KeyRef<'_>) {
        assert!(
            index < self.len,
            "index {} out of bounds for length {}",
            index,
            self.len
        );
        self.check_value(&value);
        let start = index * self.width;
        self.data.as_mut()[start..start + self.width].copy_from_slice(value.bytes());
    }

    /// Inserts `value` at `index`, shifting `[index, len)` one slot right.
    pub fn insert(&mut self, index: usize, value: KeyRef<'_>) {
        assert!(
            index <= self.len,
            "insert index {} out of bounds for length {}",
            index,
            self.len
        );
        assert!(
            self.len < self.max_len,
            "array is full at capacity {}",
            self.max_len
        );
        self.check_value(&value);
        let width = self.width;
        let start = index * width;
        let end = self.len * width;
        let data = self.data.as_mut();
        data.copy_within(start..end, start + width);
        data[start..start + width].copy_from_slice(value.bytes());
        self.len += 1;
    }

    pub fn pop(&mut self) -> IndexKey {
        assert!(self.len > 0, "pop from an empty array");
        let last = self.get(self.len - 1).to_owned_key();
        self.len -= 1;
        last
    }
}
