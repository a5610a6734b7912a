use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::page::{FileHeader, FILE_HEADER_SIZE, FILE_MAGIC};

pub struct FileHeaderCodec;

impl FileHeaderCodec {
    pub fn encode(header: &FileHeader) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FILE_HEADER_SIZE);
        bytes.extend(CommonCodec::encode_u32(FILE_MAGIC));
        bytes.extend(CommonCodec::encode_u32(header.major_version));
        bytes.extend(CommonCodec::encode_u32(header.minor_version));
        bytes.extend(CommonCodec::encode_u32(header.num_pages));
        bytes.resize(FILE_HEADER_SIZE, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> QuillIndexResult<DecodedData<FileHeader>> {
        if bytes.len() != FILE_HEADER_SIZE {
            return Err(QuillIndexError::Internal(format!(
                "File header size is not {} instead of {}",
                FILE_HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut left_bytes = bytes;

        let (magic, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if magic != FILE_MAGIC {
            return Err(QuillIndexError::Internal(format!(
                "bad file magic {:#010x}",
                magic
            )));
        }
        let (major_version, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (minor_version, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (num_pages, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        Ok((
            FileHeader {
                major_version,
                minor_version,
                num_pages,
            },
            FILE_HEADER_SIZE - left_bytes.len(),
        ))
    }
}
