use crate::frame::PageFrame;
use crate::page::PAGE_SIZE;
use crate::typedef::PageNo;
use crate::Result;
use bytemuck::{Pod, Zeroable};
use pagedb_error::errinput;
use std::mem;
use std::ops::{Deref, DerefMut};

/// On-page header of a record page. Pages with vacant slots are chained
/// through `next_free_page_no`; the chain head lives in the file header.
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug)]
pub(crate) struct RecordPageHeader {
    pub(crate) next_free_page_no: PageNo,
    pub(crate) record_cnt: u32,
}

pub(crate) const RECORD_PAGE_HEADER_SIZE: usize = mem::size_of::<RecordPageHeader>();

/// Where things sit inside a record page: header, then an occupancy bitmap
/// (one bit per slot), then the fixed-size record slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RecordLayout {
    pub(crate) record_size: usize,
    pub(crate) slots_per_page: u32,
    bitmap_bytes: usize,
}

impl RecordLayout {
    pub(crate) fn for_record_size(record_size: usize) -> Result<Self> {
        if record_size == 0 {
            return errinput!("record size must be positive");
        }
        // A slot costs its record bytes plus one occupancy bit.
        let payload_bits = (PAGE_SIZE - RECORD_PAGE_HEADER_SIZE) * 8;
        let slots = payload_bits / (record_size * 8 + 1);
        if slots == 0 {
            return errinput!("record of {record_size} bytes does not fit in a page");
        }
        Ok(Self {
            record_size,
            slots_per_page: slots as u32,
            bitmap_bytes: slots.div_ceil(8),
        })
    }

    fn bitmap_range(&self) -> std::ops::Range<usize> {
        RECORD_PAGE_HEADER_SIZE..RECORD_PAGE_HEADER_SIZE + self.bitmap_bytes
    }

    fn slot_range(&self, slot_no: u32) -> std::ops::Range<usize> {
        let start =
            RECORD_PAGE_HEADER_SIZE + self.bitmap_bytes + slot_no as usize * self.record_size;
        start..start + self.record_size
    }
}

/// View of one page of fixed-size records, generic over read-only and
/// writable frame handles.
pub(crate) struct RecordPage<T> {
    frame: T,
    layout: RecordLayout,
}

impl<T: Deref<Target = PageFrame>> RecordPage<T> {
    pub(crate) fn new(frame: T, layout: RecordLayout) -> Self {
        Self { frame, layout }
    }

    /// The header is copied out rather than cast in place: frame buffers are
    /// only byte-aligned, so an in-place view of u32 fields is not sound.
    pub(crate) fn header(&self) -> RecordPageHeader {
        bytemuck::pod_read_unaligned(&self.frame.data()[..RECORD_PAGE_HEADER_SIZE])
    }

    pub(crate) fn record_count(&self) -> u32 {
        self.header().record_cnt
    }

    pub(crate) fn next_free_page_no(&self) -> PageNo {
        self.header().next_free_page_no
    }

    pub(crate) fn is_occupied(&self, slot_no: u32) -> bool {
        let bitmap = &self.frame.data()[self.layout.bitmap_range()];
        bitmap[(slot_no / 8) as usize] & (1 << (slot_no % 8)) != 0
    }

    pub(crate) fn record(&self, slot_no: u32) -> &[u8] {
        &self.frame.data()[self.layout.slot_range(slot_no)]
    }

    /// First vacant slot of the page, in bitmap order.
    pub(crate) fn first_free_slot(&self) -> Option<u32> {
        (0..self.layout.slots_per_page).find(|&slot_no| !self.is_occupied(slot_no))
    }
}

impl<T: DerefMut + Deref<Target = PageFrame>> RecordPage<T> {
    pub(crate) fn set_header(&mut self, header: RecordPageHeader) {
        self.frame.data_mut()[..RECORD_PAGE_HEADER_SIZE]
            .copy_from_slice(bytemuck::bytes_of(&header));
    }

    /// Initializes the header of a freshly allocated (zeroed) page.
    pub(crate) fn init(&mut self, next_free_page_no: PageNo) {
        self.set_header(RecordPageHeader {
            next_free_page_no,
            record_cnt: 0,
        });
    }

    pub(crate) fn set_next_free_page_no(&mut self, next_free_page_no: PageNo) {
        let mut header = self.header();
        header.next_free_page_no = next_free_page_no;
        self.set_header(header);
    }

    pub(crate) fn set_record_cnt(&mut self, record_cnt: u32) {
        let mut header = self.header();
        header.record_cnt = record_cnt;
        self.set_header(header);
    }

    pub(crate) fn set_occupied(&mut self, slot_no: u32, occupied: bool) {
        let range = self.layout.bitmap_range();
        let bitmap = &mut self.frame.data_mut()[range];
        if occupied {
            bitmap[(slot_no / 8) as usize] |= 1 << (slot_no % 8);
        } else {
            bitmap[(slot_no / 8) as usize] &= !(1 << (slot_no % 8));
        }
    }

    pub(crate) fn write_record(&mut self, slot_no: u32, data: &[u8]) {
        let range = self.layout.slot_range(slot_no);
        self.frame.data_mut()[range].copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_fits_in_a_page() {
        for record_size in [1, 5, 16, 100, 1000, PAGE_SIZE - RECORD_PAGE_HEADER_SIZE - 1] {
            let layout = RecordLayout::for_record_size(record_size).unwrap();
            assert!(layout.slots_per_page >= 1, "record_size {record_size}");
            let end = layout
                .slot_range(layout.slots_per_page - 1)
                .end;
            assert!(end <= PAGE_SIZE, "record_size {record_size} overflows: {end}");
            // The bitmap has a bit for every slot.
            assert!(layout.slots_per_page as usize <= 8 * (layout.bitmap_range().len()));
        }
    }

    #[test]
    fn test_layout_rejects_degenerate_sizes() {
        assert!(RecordLayout::for_record_size(0).is_err());
        assert!(RecordLayout::for_record_size(PAGE_SIZE).is_err());
    }

    #[test]
    fn test_record_page_bitmap_and_header() {
        // A bare frame is enough to exercise the layout logic.
        let mut frame = PageFrame::new();
        let layout = RecordLayout::for_record_size(1000).unwrap();
        assert_eq!(layout.slots_per_page, 4);

        let mut page = RecordPage::new(&mut frame, layout);
        page.init(7);
        assert_eq!(page.next_free_page_no(), 7);
        assert_eq!(page.record_count(), 0);
        assert_eq!(page.first_free_slot(), Some(0));

        let record = vec![0xabu8; 1000];
        page.write_record(2, &record);
        page.set_occupied(2, true);
        page.set_record_cnt(1);

        assert!(page.is_occupied(2));
        assert!(!page.is_occupied(1));
        assert_eq!(page.record(2), &record[..]);
        assert_eq!(page.first_free_slot(), Some(0));
        assert_eq!(page.record_count(), 1);

        page.set_occupied(0, true);
        page.set_occupied(1, true);
        page.set_occupied(3, true);
        assert_eq!(page.first_free_slot(), None);

        page.set_occupied(2, false);
        assert_eq!(page.first_free_slot(), Some(2));
    }
}
