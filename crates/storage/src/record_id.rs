use core::fmt;

use crate::typedef::PageId;

/// Location of a record in a record file: the page that holds it plus the
/// record's slot position within that page. Not to be confused with the byte
/// offset of the record in the page data.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordId {
    page_id: PageId,
    slot_no: u32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_no: u32) -> RecordId {
        RecordId { page_id, slot_no }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot_no(&self) -> u32 {
        self.slot_no
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_ordering() {
        // Ordered by page identity first, then slot.
        let early = RecordId::new(PageId::new(1, 1), 5);
        let later_slot = RecordId::new(PageId::new(1, 1), 6);
        let later_page = RecordId::new(PageId::new(1, 2), 0);
        assert!(early < later_slot);
        assert!(later_slot < later_page);
        assert_eq!(early, RecordId::new(PageId::new(1, 1), 5));
    }
}
