use crate::error::{QuillIndexError, QuillIndexResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::key::KeyKind;
use crate::storage::page::{
    BucketPageHeader, RecordId, TreePageHeader, BUCKET_PAGE_HEADER_SIZE, BUCKET_PAGE_TAG,
    TREE_PAGE_HEADER_SIZE, TREE_PAGE_TAG,
};

pub struct TreePageHeaderCodec;

impl TreePageHeaderCodec {
    pub fn encode(header: &TreePageHeader) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TREE_PAGE_HEADER_SIZE);
        bytes.extend(CommonCodec::encode_u32(TREE_PAGE_TAG));
        bytes.extend(CommonCodec::encode_i32(header.key_count));
        bytes.extend(CommonCodec::encode_i32(header.key_width));
        bytes.extend(CommonCodec::encode_i32(header.key_kind.to_i32()));
        bytes.extend(CommonCodec::encode_bool(header.is_root));
        bytes.extend(CommonCodec::encode_bool(header.is_leaf));
        bytes.extend(CommonCodec::encode_u16(0));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> QuillIndexResult<DecodedData<TreePageHeader>> {
        let mut left_bytes = bytes;

        let (tag, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if tag != TREE_PAGE_TAG {
            return Err(QuillIndexError::Internal(format!(
                "page tag {:#010x} is not a tree node",
                tag
            )));
        }
        let (key_count, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (key_width, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (key_kind, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (is_root, offset) = CommonCodec::decode_bool(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (is_leaf, offset) = CommonCodec::decode_bool(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (_pad, offset) = CommonCodec::decode_u16(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        Ok((
            TreePageHeader {
                key_count,
                key_width,
                key_kind: KeyKind::try_from(key_kind)?,
                is_root,
                is_leaf,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct BucketPageHeaderCodec;

impl BucketPageHeaderCodec {
    pub fn encode(header: &BucketPageHeader) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BUCKET_PAGE_HEADER_SIZE);
        bytes.extend(CommonCodec::encode_u32(BUCKET_PAGE_TAG));
        bytes.extend(CommonCodec::encode_i32(header.next_bucket));
        bytes.extend(CommonCodec::encode_i32(header.rid_count));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> QuillIndexResult<DecodedData<BucketPageHeader>> {
        let mut left_bytes = bytes;

        let (tag, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if tag != BUCKET_PAGE_TAG {
            return Err(QuillIndexError::Internal(format!(
                "page tag {:#010x} is not an overflow bucket",
                tag
            )));
        }
        let (next_bucket, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (rid_count, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        Ok((
            BucketPageHeader {
                next_bucket,
                rid_count,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct RidCodec;

impl RidCodec {
    pub fn encode(rid: &RecordId) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_i32(rid.page_num);
        bytes.extend(CommonCodec::encode_i32(rid.slot_num));
        bytes
    }
}
