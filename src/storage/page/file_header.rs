use crate::error::{QuillIndexError, QuillIndexResult};

pub const FILE_MAGIC: u32 = 0x5149_4458;
/// The header occupies one full page ahead of the data pages.
pub const FILE_HEADER_SIZE: usize = crate::buffer::PAGE_SIZE;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FileHeader {
    pub major_version: u32,
    pub minor_version: u32,
    pub num_pages: u32,
}

impl FileHeader {
    pub fn try_new() -> QuillIndexResult<Self> {
        let version_str = env!("CARGO_PKG_VERSION");
        let version_arr = version_str.split('.').collect::<Vec<&str>>();
        if version_arr.len() < 2 {
            return Err(QuillIndexError::Internal(format!(
                "Package version is not xx.xx {}",
                version_str
            )));
        }
        let major_version = version_arr[0].parse::<u32>().map_err(|_| {
            QuillIndexError::Internal(format!("Failed to parse major version {}", version_arr[0]))
        })?;
        let minor_version = version_arr[1].parse::<u32>().map_err(|_| {
            QuillIndexError::Internal(format!("Failed to parse minor version {}", version_arr[1]))
        })?;

        Ok(Self {
            major_version,
            minor_version,
            num_pages: 0,
        })
    }
}
