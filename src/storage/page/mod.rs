mod bucket_page;
mod file_header;
mod record_id;
mod tree_page;
mod typed_array;

pub use bucket_page::*;
pub use file_header::*;
pub use record_id::*;
pub use tree_page::*;
pub use typed_array::TypedArray;
