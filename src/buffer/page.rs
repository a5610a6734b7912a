use log::warn;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};
use std::mem::ManuallyDrop;
use std::sync::Arc;

use crate::buffer::buffer_pool::{BufferPool, FrameId, FrameMeta};

/// Page number inside one paged file. Negative values never name a page.
pub type PageNum = i32;

pub const INVALID_PAGE_NUM: PageNum = -1;
pub const PAGE_SIZE: usize = 4096;

pub(crate) type FrameData = Box<[u8]>;

/// A pinned page with shared access to its bytes. Dropping the guard unpins it.
#[derive(Debug)]
pub struct ReadPageGuard {
    pool: Arc<BufferPool>,
    frame_id: FrameId,
    page_num: PageNum,
    guard: ManuallyDrop<ArcRwLockReadGuard<RawRwLock, FrameData>>,
}

impl ReadPageGuard {
    pub(crate) fn new(pool: Arc<BufferPool>, frame_id: FrameId, page_num: PageNum) -> Self {
        let guard = pool.frame(frame_id).read_arc();
        Self {
            pool,
            frame_id,
            page_num,
            guard: ManuallyDrop::new(guard),
        }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn data(&self) -> &[u8] {
        &self.guard[..]
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn meta_snapshot(&self) -> FrameMeta {
        self.pool.frame_meta(self.frame_id)
    }
}

impl AsRef<[u8]> for ReadPageGuard {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // release the frame latch before taking the pool lock
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }
        if let Err(e) = self.pool.complete_unpin(self.page_num, false) {
            warn!("failed to unpin page {}: {}", self.page_num, e);
        }
    }
}

/// A pinned page with exclusive access to its bytes. Any call to `data_mut`
/// marks the page written, so it is flushed before its frame is reused.
#[derive(Debug)]
pub struct WritePageGuard {
    pool: Arc<BufferPool>,
    frame_id: FrameId,
    page_num: PageNum,
    is_dirty: bool,
    guard: ManuallyDrop<ArcRwLockWriteGuard<RawRwLock, FrameData>>,
}

impl WritePageGuard {
    pub(crate) fn new(pool: Arc<BufferPool>, frame_id: FrameId, page_num: PageNum) -> Self {
        let guard = pool.frame(frame_id).write_arc();
        Self {
            pool,
            frame_id,
            page_num,
            is_dirty: false,
            guard: ManuallyDrop::new(guard),
        }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn data(&self) -> &[u8] {
        &self.guard[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.guard[..]
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn meta_snapshot(&self) -> FrameMeta {
        self.pool.frame_meta(self.frame_id)
    }
}

impl AsRef<[u8]> for WritePageGuard {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl AsMut<[u8]> for WritePageGuard {
    fn as_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }
        if let Err(e) = self.pool.complete_unpin(self.page_num, self.is_dirty) {
            warn!("failed to unpin page {}: {}", self.page_num, e);
        }
    }
}
