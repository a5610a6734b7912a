use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use strum::{Display as StrumDisplay, EnumIter};

use crate::error::{QuillIndexError, QuillIndexResult};

/// Longest fixed-length string key an index accepts.
pub const MAX_STRING_LEN: usize = 255;

/// Value type of every key in one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter)]
pub enum KeyKind {
    Int,
    Float,
    Str,
}

impl KeyKind {
    /// Width of a numeric kind. Strings take their width from the index.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            KeyKind::Int | KeyKind::Float => Some(4),
            KeyKind::Str => None,
        }
    }

    pub fn validate_width(&self, width: usize) -> QuillIndexResult<()> {
        let valid = match self.fixed_width() {
            Some(w) => w == width,
            None => (1..=MAX_STRING_LEN).contains(&width),
        };
        if !valid {
            return Err(QuillIndexError::BadArguments(format!(
                "key width {} is not valid for {} keys",
                width, self
            )));
        }
        Ok(())
    }

    pub fn to_i32(self) -> i32 {
        match self {
            KeyKind::Int => 0,
            KeyKind::Float => 1,
            KeyKind::Str => 2,
        }
    }
}

impl TryFrom<i32> for KeyKind {
    type Error = QuillIndexError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyKind::Int),
            1 => Ok(KeyKind::Float),
            2 => Ok(KeyKind::Str),
            _ => Err(QuillIndexError::Internal(format!(
                "unknown key kind {}",
                value
            ))),
        }
    }
}

/// A key borrowed from a page or from an owned [`IndexKey`].
///
/// Ordering is only defined between keys of the same kind and width; comparing
/// anything else is a programming error and panics.
#[derive(Debug, Clone, Copy)]
pub struct KeyRef<'a> {
    kind: KeyKind,
    bytes: &'a [u8],
}

impl<'a> KeyRef<'a> {
    pub fn new(kind: KeyKind, bytes: &'a [u8]) -> Self {
        if let Some(width) = kind.fixed_width() {
            assert_eq!(bytes.len(), width, "{} key must be {} bytes", kind, width);
        }
        Self { kind, bytes }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn width(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn as_i32(&self) -> i32 {
        assert_eq!(self.kind, KeyKind::Int, "key is not an integer");
        i32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    pub fn as_f32(&self) -> f32 {
        assert_eq!(self.kind, KeyKind::Float, "key is not a float");
        f32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    pub fn to_owned_key(&self) -> IndexKey {
        IndexKey {
            kind: self.kind,
            bytes: self.bytes.to_vec(),
        }
    }
}

impl Ord for KeyRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        assert!(
            self.kind == other.kind && self.bytes.len() == other.bytes.len(),
            "cannot compare {} key of width {} with {} key of width {}",
            self.kind,
            self.bytes.len(),
            other.kind,
            other.bytes.len()
        );
        match self.kind {
            KeyKind::Int => self.as_i32().cmp(&other.as_i32()),
            KeyKind::Float => self.as_f32().total_cmp(&other.as_f32()),
            KeyKind::Str => self.bytes.cmp(other.bytes),
        }
    }
}

impl PartialOrd for KeyRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyRef<'_> {}

impl Display for KeyRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            KeyKind::Int => write!(f, "{}", self.as_i32()),
            KeyKind::Float => write!(f, "{}", self.as_f32()),
            KeyKind::Str => {
                let end = self
                    .bytes
                    .iter()
                    .rposition(|b| *b != 0)
                    .map_or(0, |pos| pos + 1);
                write!(f, "{}", String::from_utf8_lossy(&self.bytes[..end]))
            }
        }
    }
}

/// An owned key, used for scan values and promoted separators.
#[derive(Debug, Clone)]
pub struct IndexKey {
    kind: KeyKind,
    bytes: Vec<u8>,
}

impl IndexKey {
    pub fn from_i32(value: i32) -> Self {
        Self {
            kind: KeyKind::Int,
            bytes: value.to_be_bytes().to_vec(),
        }
    }

    pub fn from_f32(value: f32) -> Self {
        Self {
            kind: KeyKind::Float,
            bytes: value.to_be_bytes().to_vec(),
        }
    }

    /// Zero-padded string key of exactly `width` bytes.
    pub fn from_str(value: &str, width: usize) -> QuillIndexResult<Self> {
        KeyKind::Str.validate_width(width)?;
        if value.len() > width {
            return Err(QuillIndexError::BadArguments(format!(
                "string key of {} bytes does not fit width {}",
                value.len(),
                width
            )));
        }
        let mut bytes = vec![0u8; width];
        bytes[..value.len()].copy_from_slice(value.as_bytes());
        Ok(Self {
            kind: KeyKind::Str,
            bytes,
        })
    }

    pub fn from_bytes(kind: KeyKind, bytes: &[u8]) -> QuillIndexResult<Self> {
        kind.validate_width(bytes.len())?;
        Ok(Self {
            kind,
            bytes: bytes.to_vec(),
        })
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_key_ref(&self) -> KeyRef<'_> {
        KeyRef {
            kind: self.kind,
            bytes: &self.bytes,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_key_ref().cmp(&other.as_key_ref())
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl Display for IndexKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.as_key_ref().fmt(f)
    }
}
