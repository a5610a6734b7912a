//! Frame storage, page table and replacement for the pages of one paged file.

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::buffer::page::{FrameData, PageNum, ReadPageGuard, WritePageGuard, PAGE_SIZE};
use crate::config::BufferPoolConfig;
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::disk_manager::DiskManager;
use crate::utils::cache::lru_k::LRUKReplacer;
use crate::utils::cache::Replacer;

pub type FrameId = usize;

#[derive(Debug, Default, Clone)]
pub struct FrameMeta {
    pub page_num: PageNum,
    pub pin_count: u32,
    pub is_dirty: bool,
}

#[derive(Debug)]
struct PoolState {
    meta: Vec<FrameMeta>,
    page_table: HashMap<PageNum, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LRUKReplacer,
}

/// Caches pages of a single [`DiskManager`] in a fixed set of frames.
///
/// Page bytes sit behind one `RwLock` per frame; the guards returned by the
/// fetch methods hold that lock and a pin for as long as they live. All other
/// bookkeeping (page table, pin counts, dirty flags, replacer) is serialized by
/// one pool mutex. A frame lock is never acquired while waiting on another frame
/// lock, and guards release their frame lock before taking the pool mutex.
#[derive(Debug)]
pub struct BufferPool {
    frames: Vec<Arc<RwLock<FrameData>>>,
    state: Mutex<PoolState>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig, disk_manager: Arc<DiskManager>) -> Self {
        let num_frames = config.buffer_pool_size;
        let mut frames = Vec::with_capacity(num_frames);
        let mut meta = Vec::with_capacity(num_frames);
        let mut free_list = VecDeque::with_capacity(num_frames);
        for frame_id in 0..num_frames {
            frames.push(Arc::new(RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice())));
            meta.push(FrameMeta::default());
            free_list.push_back(frame_id);
        }

        Self {
            frames,
            state: Mutex::new(PoolState {
                meta,
                page_table: HashMap::new(),
                free_list,
                replacer: LRUKReplacer::with_k(num_frames, config.lru_k_k),
            }),
            disk_manager,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub(crate) fn frame(&self, frame_id: FrameId) -> &Arc<RwLock<FrameData>> {
        &self.frames[frame_id]
    }

    pub fn frame_meta(&self, frame_id: FrameId) -> FrameMeta {
        self.state.lock().meta[frame_id].clone()
    }

    /// Appends a zeroed page to the file and returns it pinned for writing.
    pub fn new_page(self: &Arc<Self>) -> QuillIndexResult<WritePageGuard> {
        let mut state = self.state.lock();
        // claim a frame first so a full pool does not grow the file
        let frame_id = self.acquire_frame(&mut state)?;
        let page_num = match self.disk_manager.allocate_page() {
            Ok(page_num) => page_num,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };
        self.frames[frame_id].write().fill(0);
        state.page_table.insert(page_num, frame_id);
        state.meta[frame_id] = FrameMeta {
            page_num,
            pin_count: 0,
            is_dirty: false,
        };
        self.pin(&mut state, frame_id)?;
        drop(state);
        trace!("allocated page {} in frame {}", page_num, frame_id);

        Ok(WritePageGuard::new(self.clone(), frame_id, page_num))
    }

    pub fn fetch_page_read(self: &Arc<Self>, page_num: PageNum) -> QuillIndexResult<ReadPageGuard> {
        let frame_id = self.pin_page(page_num)?;
        Ok(ReadPageGuard::new(self.clone(), frame_id, page_num))
    }

    pub fn fetch_page_write(
        self: &Arc<Self>,
        page_num: PageNum,
    ) -> QuillIndexResult<WritePageGuard> {
        let frame_id = self.pin_page(page_num)?;
        Ok(WritePageGuard::new(self.clone(), frame_id, page_num))
    }

    fn pin_page(&self, page_num: PageNum) -> QuillIndexResult<FrameId> {
        let mut state = self.state.lock();
        let frame_id = match state.page_table.get(&page_num) {
            Some(frame_id) => *frame_id,
            None => {
                self.disk_manager.check_page_num(page_num)?;
                let frame_id = self.acquire_frame(&mut state)?;
                let loaded = {
                    let mut frame = self.frames[frame_id].write();
                    self.disk_manager.read_page(page_num, &mut frame)
                };
                if let Err(e) = loaded {
                    state.free_list.push_back(frame_id);
                    return Err(e);
                }
                state.page_table.insert(page_num, frame_id);
                state.meta[frame_id] = FrameMeta {
                    page_num,
                    pin_count: 0,
                    is_dirty: false,
                };
                frame_id
            }
        };
        self.pin(&mut state, frame_id)?;
        Ok(frame_id)
    }

    fn pin(&self, state: &mut PoolState, frame_id: FrameId) -> QuillIndexResult<()> {
        state.meta[frame_id].pin_count += 1;
        state.replacer.record_access(frame_id)?;
        state.replacer.set_evictable(frame_id, false)?;
        Ok(())
    }

    /// Finds an empty frame, evicting an unpinned page if needed.
    fn acquire_frame(&self, state: &mut PoolState) -> QuillIndexResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }
        let Some(frame_id) = state.replacer.evict() else {
            return Err(QuillIndexError::NoBufferSpace(self.capacity()));
        };
        let victim = state.meta[frame_id].clone();
        if victim.is_dirty {
            let frame = self.frames[frame_id].read();
            if let Err(e) = self.disk_manager.write_page(victim.page_num, &frame) {
                state.replacer.record_access(frame_id)?;
                state.replacer.set_evictable(frame_id, true)?;
                return Err(e);
            }
        }
        state.page_table.remove(&victim.page_num);
        state.meta[frame_id] = FrameMeta::default();
        debug!(
            "evicted page {} from frame {} (dirty: {})",
            victim.page_num, frame_id, victim.is_dirty
        );
        Ok(frame_id)
    }

    /// Drops one pin on `page_num`, recording whether the holder wrote to it.
    pub fn complete_unpin(&self, page_num: PageNum, is_dirty: bool) -> QuillIndexResult<()> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_num) else {
            return Err(QuillIndexError::InvalidPage(page_num));
        };
        let meta = &mut state.meta[frame_id];
        if meta.pin_count == 0 {
            return Err(QuillIndexError::Internal(format!(
                "page {} unpinned more often than pinned",
                page_num
            )));
        }
        meta.pin_count -= 1;
        meta.is_dirty |= is_dirty;
        if meta.pin_count == 0 {
            state.replacer.set_evictable(frame_id, true)?;
        }
        Ok(())
    }

    /// Writes `page_num` back if it is cached and dirty. Returns whether a write
    /// happened. Fails with `PagePinned` while a writer holds the page.
    pub fn flush_page(&self, page_num: PageNum) -> QuillIndexResult<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_num) else {
            self.disk_manager.check_page_num(page_num)?;
            return Ok(false);
        };
        self.flush_frame(&mut state, frame_id)
    }

    fn flush_frame(&self, state: &mut PoolState, frame_id: FrameId) -> QuillIndexResult<bool> {
        let meta = &state.meta[frame_id];
        if !meta.is_dirty {
            return Ok(false);
        }
        let page_num = meta.page_num;
        let Some(frame) = self.frames[frame_id].try_read() else {
            return Err(QuillIndexError::PagePinned(page_num));
        };
        self.disk_manager.write_page(page_num, &frame)?;
        drop(frame);
        state.meta[frame_id].is_dirty = false;
        trace!("flushed page {} from frame {}", page_num, frame_id);
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> QuillIndexResult<()> {
        let mut state = self.state.lock();
        let mut frame_ids: Vec<FrameId> = state.page_table.values().copied().collect();
        frame_ids.sort_unstable();
        for frame_id in frame_ids {
            self.flush_frame(&mut state, frame_id)?;
        }
        drop(state);
        self.disk_manager.sync()
    }

    /// Cached pages that are currently pinned, in page order.
    pub fn pinned_pages(&self) -> Vec<PageNum> {
        let state = self.state.lock();
        let mut pinned: Vec<PageNum> = state
            .page_table
            .iter()
            .filter(|(_, frame_id)| state.meta[**frame_id].pin_count > 0)
            .map(|(page_num, _)| *page_num)
            .collect();
        pinned.sort_unstable();
        pinned
    }
}
