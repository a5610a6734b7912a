pub mod codec;
pub mod disk_manager;
pub mod index;
pub mod key;
pub mod page;
pub mod paged_file;
