mod buffer_pool;
mod page;

pub use buffer_pool::{BufferPool, FrameId, FrameMeta};
pub use page::{PageNum, ReadPageGuard, WritePageGuard, INVALID_PAGE_NUM, PAGE_SIZE};
