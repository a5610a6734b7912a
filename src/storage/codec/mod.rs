mod common;
mod file_header;
mod index_page;

pub use common::CommonCodec;
pub use file_header::FileHeaderCodec;
pub use index_page::{BucketPageHeaderCodec, RidCodec, TreePageHeaderCodec};

// data + consumed offset
pub type DecodedData<T> = (T, usize);
