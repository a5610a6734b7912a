use crate::buffer::FrameId;
use crate::error::QuillIndexResult;

pub mod lru_k;

pub trait Replacer {
    fn new(capacity: usize) -> Self
    where
        Self: Sized;

    fn record_access(&mut self, frame_id: FrameId) -> QuillIndexResult<()>;

    fn evict(&mut self) -> Option<FrameId>;

    fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) -> QuillIndexResult<()>;

    fn remove(&mut self, frame_id: FrameId);

    fn size(&self) -> usize;
}
