use bytes::Bytes;

use crate::buffer_pool::BufferPoolManager;
use crate::page::record_page::RecordPage;
use crate::record::record_file::RecordFile;
use crate::record::Record;
use crate::record_id::RecordId;
use crate::typedef::{PageId, PageNo};
use crate::Result;

/// An iterator over all records in a record file, in page/slot order.
///
/// Each page is fetched through the buffer pool for as long as its slots are
/// being examined and unpinned again before the scan moves on, so a scan
/// never holds more than one page pinned at a time.
pub struct RecordScan<'a> {
    file: &'a RecordFile,
    page_no: PageNo,
    slot_no: u32,
}

impl<'a> RecordScan<'a> {
    pub(crate) fn new(file: &'a RecordFile) -> Self {
        Self {
            file,
            page_no: 1, // page 0 is the file header
            slot_no: 0,
        }
    }
}

impl Iterator for RecordScan<'_> {
    type Item = Result<(RecordId, Record)>;

    /// Emits the next occupied slot's record, skipping vacant slots and
    /// advancing across pages. Recoverable fetch errors are surfaced as
    /// `Some(Err(e))`.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page_no >= self.file.num_pages() {
                return None;
            }
            let page_id = PageId::new(self.file.file_id(), self.page_no);
            let handle = match BufferPoolManager::fetch_page_handle(self.file.bpm(), page_id) {
                Ok(handle) => handle,
                Err(e) => return Some(Err(e)),
            };
            let page = RecordPage::new(handle, self.file.layout());

            while self.slot_no < self.file.layout().slots_per_page {
                let slot_no = self.slot_no;
                self.slot_no += 1;
                if page.is_occupied(slot_no) {
                    let record = Record::new(Bytes::copy_from_slice(page.record(slot_no)));
                    return Some(Ok((RecordId::new(page_id, slot_no), record)));
                }
            }

            // Page exhausted; unpin it and move to the next one.
            self.page_no += 1;
            self.slot_no = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::disk_manager::DiskManager;
    use crate::replacer::lru_replacer::LruReplacer;
    use serial_test::serial;
    use std::sync::{Arc, Mutex, RwLock};

    const RECORD_SIZE: usize = 1000; // 4 slots per page

    fn get_bpm_with_pool_size(pool_size: usize) -> Arc<RwLock<BufferPoolManager>> {
        let disk_manager = Arc::new(Mutex::new(DiskManager::new()));
        let replacer = Box::new(LruReplacer::new(pool_size));
        Arc::new(RwLock::new(BufferPoolManager::new(
            pool_size,
            disk_manager,
            replacer,
        )))
    }

    fn record(fill: u8) -> Vec<u8> {
        vec![fill; RECORD_SIZE]
    }

    #[test]
    #[serial]
    fn test_scan_empty_file() {
        let bpm = get_bpm_with_pool_size(4);
        let file = RecordFile::create(bpm, "scan_empty.db", RECORD_SIZE).unwrap();
        assert_eq!(file.scan().count(), 0);
    }

    #[test]
    #[serial]
    fn test_scan_visits_all_records_across_pages() {
        let bpm = get_bpm_with_pool_size(4);
        let mut file = RecordFile::create(bpm, "scan_pages.db", RECORD_SIZE).unwrap();

        let mut rids = Vec::new();
        for i in 0..10 {
            rids.push(file.insert_record(&record(i)).unwrap());
        }

        let scanned: Vec<(RecordId, Record)> =
            file.scan().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(scanned.len(), 10);
        // Page/slot order matches insertion order here, since nothing was
        // deleted while inserting.
        for (i, (rid, rec)) in scanned.iter().enumerate() {
            assert_eq!(rid, &rids[i]);
            assert_eq!(rec.data(), &record(i as u8)[..]);
        }
    }

    #[test]
    #[serial]
    fn test_scan_skips_deleted_slots() {
        let bpm = get_bpm_with_pool_size(4);
        let mut file = RecordFile::create(bpm, "scan_holes.db", RECORD_SIZE).unwrap();

        let mut rids = Vec::new();
        for i in 0..10 {
            rids.push(file.insert_record(&record(i)).unwrap());
        }
        // Punch holes at both ends of a page and in the middle of the file.
        file.delete_record(&rids[0]).unwrap();
        file.delete_record(&rids[3]).unwrap();
        file.delete_record(&rids[7]).unwrap();

        let scanned: Vec<(RecordId, Record)> =
            file.scan().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(scanned.len(), 7);
        assert!(scanned.iter().all(|(rid, _)| {
            *rid != rids[0] && *rid != rids[3] && *rid != rids[7]
        }));

        // The survivors still carry their own contents.
        for (rid, rec) in &scanned {
            let i = rids.iter().position(|r| r == rid).unwrap();
            assert_eq!(rec.data(), &record(i as u8)[..]);
        }
    }

    #[test]
    #[serial]
    fn test_scan_leaves_nothing_pinned() {
        let bpm = get_bpm_with_pool_size(4);
        let mut file =
            RecordFile::create(Arc::clone(&bpm), "scan_unpin.db", RECORD_SIZE).unwrap();

        for i in 0..10 {
            file.insert_record(&record(i)).unwrap();
        }
        let total = file.scan().count();
        assert_eq!(total, 10);

        // Every page the scan touched has been unpinned again.
        assert_eq!(
            bpm.read().unwrap().free_frame_count(),
            bpm.read().unwrap().capacity()
        );
    }
}
