use std::mem;
use std::sync::{Arc, RwLock};

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use pagedb_error::{errdata, errinput};

use crate::buffer_pool::BufferPoolManager;
use crate::page::record_page::{RecordLayout, RecordPage};
use crate::record::Record;
use crate::record_id::RecordId;
use crate::typedef::{FileId, PageId, PageNo};
use crate::Result;

/// Persistent header of a record file, stored in page 0. Data pages start at
/// page 1.
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug)]
struct RecordFileHeader {
    record_size: u32,
    /// Number of pages in the file, the header page included.
    num_pages: u32,
    num_records: u32,
    /// Head of the chain of data pages with vacant slots.
    first_free_page_no: PageNo,
}

const RECORD_FILE_HEADER_SIZE: usize = mem::size_of::<RecordFileHeader>();

/// Page 0 holds the file header and no records, so its page number can serve
/// as the "no free page" sentinel in the chain.
const NO_FREE_PAGE: PageNo = 0;

/// A file of fixed-size records, layered on top of the buffer pool.
///
/// Every page access goes through `fetch`/`new_page` handles; each handle is
/// unpinned exactly once (on drop) with the dirty flag the access deserved.
/// Header changes are written through to page 0 immediately, so the on-disk
/// state is recovered on open straight from the header page.
pub struct RecordFile {
    bpm: Arc<RwLock<BufferPoolManager>>,
    file_id: FileId,
    header: RecordFileHeader,
    layout: RecordLayout,
}

impl RecordFile {
    /// Creates a record file for records of `record_size` bytes, allocating
    /// its header page.
    pub fn create(
        bpm: Arc<RwLock<BufferPoolManager>>,
        name: &str,
        record_size: usize,
    ) -> Result<RecordFile> {
        let layout = RecordLayout::for_record_size(record_size)?;
        let file_id = {
            let bpm_guard = bpm.read()?;
            let mut disk = bpm_guard.disk_manager().lock()?;
            disk.create_file(name)?
        };

        let header = RecordFileHeader {
            record_size: record_size as u32,
            num_pages: 1,
            num_records: 0,
            first_free_page_no: NO_FREE_PAGE,
        };
        {
            let mut header_page = BufferPoolManager::create_page_handle(&bpm, file_id)?;
            debug_assert_eq!(header_page.page_id().page_no(), 0);
            header_page.write(0, bytemuck::bytes_of(&header));
        }

        Ok(RecordFile {
            bpm,
            file_id,
            header,
            layout,
        })
    }

    /// Opens an existing record file, reading its header page.
    pub fn open(bpm: Arc<RwLock<BufferPoolManager>>, name: &str) -> Result<RecordFile> {
        let file_id = {
            let bpm_guard = bpm.read()?;
            let mut disk = bpm_guard.disk_manager().lock()?;
            disk.open_file(name)?
        };

        let header: RecordFileHeader = {
            let header_page =
                BufferPoolManager::fetch_page_handle(&bpm, PageId::new(file_id, 0))?;
            bytemuck::pod_read_unaligned(&header_page.data()[..RECORD_FILE_HEADER_SIZE])
        };
        if header.record_size == 0 {
            return errdata!("file {name} has no record file header");
        }
        let layout = RecordLayout::for_record_size(header.record_size as usize)?;

        Ok(RecordFile {
            bpm,
            file_id,
            header,
            layout,
        })
    }

    /// Retrieves the record stored at `rid`.
    pub fn get_record(&self, rid: &RecordId) -> Result<Record> {
        self.validate(rid)?;
        let handle = BufferPoolManager::fetch_page_handle(&self.bpm, rid.page_id())?;
        let page = RecordPage::new(handle, self.layout);
        if !page.is_occupied(rid.slot_no()) {
            return errinput!("no record at {rid}");
        }
        Ok(Record::new(Bytes::copy_from_slice(
            page.record(rid.slot_no()),
        )))
    }

    /// Inserts a record, not specifying a position: the first vacant slot of
    /// the free-page chain head, or slot 0 of a freshly allocated page.
    pub fn insert_record(&mut self, data: &[u8]) -> Result<RecordId> {
        if data.len() != self.layout.record_size {
            return errinput!(
                "record is {} bytes, expected {}",
                data.len(),
                self.layout.record_size
            );
        }

        if self.header.first_free_page_no != NO_FREE_PAGE {
            let page_id = PageId::new(self.file_id, self.header.first_free_page_no);
            let handle = BufferPoolManager::fetch_page_mut_handle(&self.bpm, page_id)?;
            let mut page = RecordPage::new(handle, self.layout);

            let slot_no = match page.first_free_slot() {
                Some(slot_no) => slot_no,
                None => return errdata!("page {page_id} is chained as free but has no vacancy"),
            };
            page.write_record(slot_no, data);
            page.set_occupied(slot_no, true);
            page.set_record_cnt(page.record_count() + 1);

            // A page that just filled up leaves the chain.
            if page.record_count() == self.layout.slots_per_page {
                self.header.first_free_page_no = page.next_free_page_no();
                page.set_next_free_page_no(NO_FREE_PAGE);
            }
            self.header.num_records += 1;
            drop(page);
            self.sync_header()?;

            Ok(RecordId::new(page_id, slot_no))
        } else {
            // No page has a vacant slot; allocate a fresh one.
            let handle = BufferPoolManager::create_page_handle(&self.bpm, self.file_id)?;
            let page_id = handle.page_id();
            debug_assert_eq!(page_id.page_no(), self.header.num_pages);

            let mut page = RecordPage::new(handle, self.layout);
            page.init(NO_FREE_PAGE);
            page.write_record(0, data);
            page.set_occupied(0, true);
            page.set_record_cnt(1);

            self.header.num_pages += 1;
            self.header.num_records += 1;
            if self.layout.slots_per_page > 1 {
                self.header.first_free_page_no = page_id.page_no();
            }
            drop(page);
            self.sync_header()?;

            Ok(RecordId::new(page_id, 0))
        }
    }

    /// Overwrites the record at `rid` in place.
    pub fn update_record(&self, rid: &RecordId, data: &[u8]) -> Result<()> {
        self.validate(rid)?;
        if data.len() != self.layout.record_size {
            return errinput!(
                "record is {} bytes, expected {}",
                data.len(),
                self.layout.record_size
            );
        }
        let handle = BufferPoolManager::fetch_page_mut_handle(&self.bpm, rid.page_id())?;
        let mut page = RecordPage::new(handle, self.layout);
        if !page.is_occupied(rid.slot_no()) {
            return errinput!("no record at {rid}");
        }
        page.write_record(rid.slot_no(), data);
        Ok(())
    }

    /// Deletes the record at `rid`, returning it. A full page that regains a
    /// vacancy re-enters the free-page chain.
    pub fn delete_record(&mut self, rid: &RecordId) -> Result<Record> {
        self.validate(rid)?;
        let handle = BufferPoolManager::fetch_page_mut_handle(&self.bpm, rid.page_id())?;
        let mut page = RecordPage::new(handle, self.layout);
        if !page.is_occupied(rid.slot_no()) {
            return errinput!("no record at {rid}");
        }

        let removed = Record::new(Bytes::copy_from_slice(page.record(rid.slot_no())));
        let was_full = page.record_count() == self.layout.slots_per_page;
        page.set_occupied(rid.slot_no(), false);
        page.set_record_cnt(page.record_count() - 1);
        if was_full {
            page.set_next_free_page_no(self.header.first_free_page_no);
            self.header.first_free_page_no = rid.page_id().page_no();
        }
        self.header.num_records -= 1;
        drop(page);
        self.sync_header()?;

        Ok(removed)
    }

    /// Writes every resident page of this file back to disk.
    pub fn flush(&self) -> Result<()> {
        self.bpm.write()?.flush_all_pages(self.file_id)
    }

    /// Iterates over all records in the file in page/slot order.
    pub fn scan(&self) -> crate::record::record_scan::RecordScan<'_> {
        crate::record::record_scan::RecordScan::new(self)
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn record_size(&self) -> usize {
        self.layout.record_size
    }

    pub fn num_records(&self) -> u32 {
        self.header.num_records
    }

    pub(crate) fn num_pages(&self) -> u32 {
        self.header.num_pages
    }

    pub(crate) fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub(crate) fn bpm(&self) -> &Arc<RwLock<BufferPoolManager>> {
        &self.bpm
    }

    /// Writes the cached file header through to page 0.
    fn sync_header(&self) -> Result<()> {
        let mut header_page =
            BufferPoolManager::fetch_page_mut_handle(&self.bpm, PageId::new(self.file_id, 0))?;
        header_page.write(0, bytemuck::bytes_of(&self.header));
        Ok(())
    }

    fn validate(&self, rid: &RecordId) -> Result<()> {
        if rid.page_id().file_id() != self.file_id
            || rid.page_id().page_no() == 0
            || rid.page_id().page_no() >= self.header.num_pages
            || rid.slot_no() >= self.layout.slots_per_page
        {
            return errinput!("record id {rid} is out of range");
        }
        Ok(())
    }
}
