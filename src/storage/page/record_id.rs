use std::fmt::{Display, Formatter};

use crate::buffer::{PageNum, INVALID_PAGE_NUM};

pub type SlotNum = i32;

/// Location of a record in its heap file.
#[derive(derive_new::new, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_num: PageNum,
    pub slot_num: SlotNum,
}

impl RecordId {
    /// Returned by a scan once it has no more entries.
    pub const END: RecordId = RecordId {
        page_num: INVALID_PAGE_NUM,
        slot_num: -1,
    };

    pub fn is_end(&self) -> bool {
        *self == Self::END
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.page_num, self.slot_num)
    }
}
