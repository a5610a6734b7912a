use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::codec::DecodedData;

pub struct CommonCodec;

impl CommonCodec {
    pub fn encode_bool(data: bool) -> Vec<u8> {
        if data {
            vec![1]
        } else {
            vec![0]
        }
    }

    pub fn decode_bool(bytes: &[u8]) -> QuillIndexResult<DecodedData<bool>> {
        if bytes.is_empty() {
            return Err(QuillIndexError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                1
            )));
        }
        Ok((bytes[0] != 0, 1))
    }

    pub fn encode_u16(data: u16) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u16(bytes: &[u8]) -> QuillIndexResult<DecodedData<u16>> {
        if bytes.len() < 2 {
            return Err(QuillIndexError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                2
            )));
        }
        let data = [bytes[0], bytes[1]];
        Ok((u16::from_be_bytes(data), 2))
    }

    pub fn encode_u32(data: u32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u32(bytes: &[u8]) -> QuillIndexResult<DecodedData<u32>> {
        if bytes.len() < 4 {
            return Err(QuillIndexError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                4
            )));
        }
        let data = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok((u32::from_be_bytes(data), 4))
    }

    pub fn encode_i32(data: i32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_i32(bytes: &[u8]) -> QuillIndexResult<DecodedData<i32>> {
        if bytes.len() < 4 {
            return Err(QuillIndexError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                4
            )));
        }
        let data = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok((i32::from_be_bytes(data), 4))
    }
}
