use crate::buffer::{PageNum, PAGE_SIZE};
use crate::error::QuillIndexResult;
use crate::storage::codec::{BucketPageHeaderCodec, RidCodec};
use crate::storage::page::RecordId;
use crate::utils::bitmap::{num_bytes_for, Bitmap};

pub const BUCKET_PAGE_TAG: u32 = 0x5142_4b54;
pub const BUCKET_PAGE_HEADER_SIZE: usize = 12;

const RID_SIZE: usize = 8;
const NEXT_BUCKET_OFFSET: usize = 4;
const RID_COUNT_OFFSET: usize = 8;

/// RID slots per bucket: each slot costs 8 bytes plus one bitmap bit, and the
/// bitmap is kept a whole number of bytes.
pub const MAX_RIDS: usize = 8 * ((PAGE_SIZE - BUCKET_PAGE_HEADER_SIZE) / (8 * RID_SIZE + 1));

const BITMAP_START: usize = BUCKET_PAGE_HEADER_SIZE;
const RIDS_START: usize = BITMAP_START + num_bytes_for(MAX_RIDS);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BucketPageHeader {
    pub next_bucket: PageNum,
    pub rid_count: i32,
}

/// Overflow bucket layout over one page buffer:
///
/// ```text
/// | header (12) | bitmap[ceil(MAX_RIDS / 8)] | rids[MAX_RIDS] |
/// ```
///
/// A set bit marks a live RID slot; `rid_count` always equals the number of set bits.
#[derive(Debug)]
pub struct BucketPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> BucketPage<B> {
    pub fn new(data: B) -> QuillIndexResult<Self> {
        BucketPageHeaderCodec::decode(data.as_ref())?;
        Ok(Self { data })
    }

    pub fn is_bucket_page(bytes: &[u8]) -> bool {
        BucketPageHeaderCodec::decode(bytes).is_ok()
    }

    fn read_i32(&self, offset: usize) -> i32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data.as_ref()[offset..offset + 4]);
        i32::from_be_bytes(buf)
    }

    pub fn next_bucket(&self) -> PageNum {
        self.read_i32(NEXT_BUCKET_OFFSET)
    }

    pub fn rid_count(&self) -> usize {
        self.read_i32(RID_COUNT_OFFSET) as usize
    }

    pub fn is_full(&self) -> bool {
        self.rid_count() == MAX_RIDS
    }

    pub fn bitmap(&self) -> Bitmap<&[u8]> {
        Bitmap::new(MAX_RIDS, &self.data.as_ref()[BITMAP_START..RIDS_START])
    }

    /// RID in `slot`, whether or not the slot is live.
    pub fn rid_at(&self, slot: usize) -> RecordId {
        assert!(slot < MAX_RIDS, "rid slot {} out of range", slot);
        let start = RIDS_START + slot * RID_SIZE;
        RecordId::new(self.read_i32(start), self.read_i32(start + 4))
    }

    /// First live slot at or after `from`.
    pub fn next_live_slot(&self, from: usize) -> Option<usize> {
        self.bitmap().next_set(from)
    }

    pub fn find(&self, rid: &RecordId) -> Option<usize> {
        let bitmap = self.bitmap();
        (0..MAX_RIDS).find(|slot| bitmap.get(*slot) && self.rid_at(*slot) == *rid)
    }

    pub fn live_rids(&self) -> impl Iterator<Item = RecordId> + '_ {
        let mut next = self.next_live_slot(0);
        std::iter::from_fn(move || {
            let slot = next?;
            next = self.next_live_slot(slot + 1);
            Some(self.rid_at(slot))
        })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BucketPage<B> {
    /// Formats `data` as an empty bucket linked to `next_bucket`.
    pub fn init(mut data: B, next_bucket: PageNum) -> Self {
        let header = BucketPageHeader {
            next_bucket,
            rid_count: 0,
        };
        let encoded = BucketPageHeaderCodec::encode(&header);
        let bytes = data.as_mut();
        bytes[..encoded.len()].copy_from_slice(&encoded);
        bytes[BITMAP_START..RIDS_START].fill(0);
        Self { data }
    }

    fn write_i32(&mut self, offset: usize, value: i32) {
        self.data.as_mut()[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn set_next_bucket(&mut self, next_bucket: PageNum) {
        self.write_i32(NEXT_BUCKET_OFFSET, next_bucket);
    }

    fn bitmap_mut(&mut self) -> Bitmap<&mut [u8]> {
        Bitmap::new(MAX_RIDS, &mut self.data.as_mut()[BITMAP_START..RIDS_START])
    }

    /// Stores `rid` in the first free slot. Returns the slot, or `None` when full.
    pub fn add(&mut self, rid: &RecordId) -> Option<usize> {
        let slot = self.bitmap().first_unset()?;
        let start = RIDS_START + slot * RID_SIZE;
        self.data.as_mut()[start..start + RID_SIZE].copy_from_slice(&RidCodec::encode(rid));
        self.bitmap_mut().set(slot);
        let count = self.rid_count() as i32;
        self.write_i32(RID_COUNT_OFFSET, count + 1);
        Some(slot)
    }

    /// Frees the slot holding `rid`. Returns whether it was present.
    pub fn remove(&mut self, rid: &RecordId) -> bool {
        let Some(slot) = self.find(rid) else {
            return false;
        };
        self.bitmap_mut().clear(slot);
        let count = self.rid_count() as i32;
        self.write_i32(RID_COUNT_OFFSET, count - 1);
        true
    }
}
