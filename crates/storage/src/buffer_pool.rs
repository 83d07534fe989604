use pagedb_error::Error;

use crate::disk::disk_manager::DiskManager;
use crate::frame::PageFrame;
use crate::frame_handle::{PageFrameMutHandle, PageFrameRefHandle};
use crate::typedef::{FileId, FrameId, PageId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use crate::Result;

use crate::replacer::replacer::Replacer;

/// The single authority translating page identities into memory: owns the
/// frame table, the page table, the free list, and the eviction tracker, and
/// orchestrates disk I/O so that callers see a consistent, pinned view of a
/// page's latest contents.
///
/// Callers hold the manager in an `Arc<RwLock<..>>`; every public operation
/// runs under that exclusive lock. The tracker keeps its own lock and knows
/// nothing of disk I/O or the page table.
///
/// Known limitation: loads and write-backs happen with the manager's lock
/// held, so a stalled disk call stalls every operation. Narrowing the
/// critical section would require reserving the frame being written so no
/// other thread can claim it mid-write.
#[derive(Debug)]
pub struct BufferPoolManager {
    frames: Vec<PageFrame>, // Storage for all frames in the buffer pool
    page_table: HashMap<PageId, FrameId>, // Maps page identities to frame indices
    replacer: Box<dyn Replacer>, // Tracks unpinned resident frames for eviction
    free_list: VecDeque<FrameId>, // Frames holding no page; clean, no write-back needed
    disk_manager: Arc<Mutex<DiskManager>>, // Performs the synchronous page I/O
}

impl BufferPoolManager {
    /// Initializes the buffer pool with a given size.
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<Mutex<DiskManager>>,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        frames.resize_with(pool_size, PageFrame::new);

        Self {
            frames,
            page_table: HashMap::new(),
            replacer,
            free_list: (0..pool_size).collect(),
            disk_manager,
        }
    }

    /// Writes the frame's bytes back to disk if it is dirty, clearing the
    /// dirty flag. Both eviction and flushing go through here, so the
    /// dirty-clearing invariant lives in exactly one place.
    fn write_back_if_dirty(&mut self, frame_id: FrameId) -> Result<()> {
        let frame = &mut self.frames[frame_id];
        if !frame.is_dirty() {
            return Ok(());
        }
        let page_id = match frame.page_id() {
            Some(page_id) => page_id,
            // A dirty frame always holds an identity; unassigned frames are clean.
            None => return Ok(()),
        };
        let mut disk = self.disk_manager.lock()?;
        disk.write_page(page_id, frame.data())?;
        frame.set_dirty(false);
        log::trace!("wrote back page {} from frame {}", page_id, frame_id);
        Ok(())
    }

    /// Returns a frame ready for reuse: the front of the free list if one is
    /// available (no write-back needed, free frames are always clean and
    /// unassigned), otherwise a victim from the tracker, written back if
    /// dirty and unmapped from the page table.
    fn victim_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.select_victim().ok_or(Error::CacheExhausted)?;
        assert_eq!(
            self.frames[frame_id].pin_count(),
            0,
            "A frame selected as victim must not be pinned."
        );

        self.write_back_if_dirty(frame_id)?;

        let frame = &mut self.frames[frame_id];
        if let Some(old_id) = frame.page_id() {
            self.page_table.remove(&old_id);
            log::debug!("evicted page {} from frame {}", old_id, frame_id);
        }
        frame.reset();

        Ok(frame_id)
    }

    /// Loads the page's bytes from disk into the frame and stamps it as a
    /// freshly pinned, clean copy of `page_id`.
    fn load_into_frame(&mut self, page_id: PageId, frame_id: FrameId) -> Result<()> {
        let frame = &mut self.frames[frame_id];
        {
            let mut disk = self.disk_manager.lock()?;
            disk.read_page(page_id, frame.data_mut())?;
        }
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.set_pin_count(1);
        Ok(())
    }

    /// Allocates a new page in `file_id` and pins it into a frame. The page
    /// number is fresh and monotonically increasing within the file; the
    /// frame's bytes are zeroed.
    fn create_page(&mut self, file_id: FileId) -> Result<(PageId, &mut PageFrame)> {
        let frame_id = self.victim_frame()?;

        let page_id = match self.disk_manager.lock()?.allocate_page(file_id) {
            Ok(page_id) => page_id,
            Err(e) => {
                // The frame holds no page; hand it back for reuse.
                self.free_list.push_front(frame_id);
                return Err(e);
            }
        };

        // The frame came back reset from the free list or eviction, so its
        // bytes are already zeroed.
        let frame = &mut self.frames[frame_id];
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.set_pin_count(1);

        self.page_table.insert(page_id, frame_id);

        Ok((page_id, &mut self.frames[frame_id]))
    }

    /// Fetches a page, pinning it. On a page-table hit the resident frame is
    /// returned with its pin count incremented and no disk access; otherwise
    /// the page is loaded into a reclaimed frame.
    fn fetch_page(&mut self, page_id: PageId) -> Result<&mut PageFrame> {
        // Re-checking residency under the exclusive lock is what keeps two
        // concurrent fetches of the same identity from both loading it.
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.replacer.mark_pinned(frame_id); // pinned frames are not evictable
            let frame = &mut self.frames[frame_id];
            frame.increment_pin_count();
            return Ok(frame);
        }

        let frame_id = self.victim_frame()?;
        if let Err(e) = self.load_into_frame(page_id, frame_id) {
            // The load failed; scrub the frame and hand it back for reuse.
            self.frames[frame_id].reset();
            self.free_list.push_front(frame_id);
            return Err(e);
        }
        self.page_table.insert(page_id, frame_id);

        Ok(&mut self.frames[frame_id])
    }

    /// Unpins a page, ORing `is_dirty` into its dirty flag. Once the pin
    /// count reaches zero the frame becomes evictable. Decrementing an
    /// already-zero pin count is tolerated (clamped); unpinning a page that
    /// is not resident indicates a caller lifetime bug and fails.
    pub fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(Error::NotResident(page_id.to_string())),
        };

        let frame = &mut self.frames[frame_id];
        if is_dirty {
            frame.set_dirty(true);
        }
        frame.decrement_pin_count();
        if frame.pin_count() == 0 {
            self.replacer.mark_unpinned(frame_id);
        }
        Ok(())
    }

    /// Writes a resident page back to disk regardless of its pin state,
    /// clearing the dirty flag. Pin count and tracking are unaffected.
    pub fn flush_page(&mut self, page_id: PageId) -> Result<()> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(Error::NotResident(page_id.to_string())),
        };
        self.write_back_if_dirty(frame_id)
    }

    /// Flushes every resident page belonging to `file_id`. Order is page
    /// table iteration order; each flush is independent and idempotent.
    pub fn flush_all_pages(&mut self, file_id: FileId) -> Result<()> {
        let resident: Vec<FrameId> = self
            .page_table
            .iter()
            .filter(|(page_id, _)| page_id.file_id() == file_id)
            .map(|(_, &frame_id)| frame_id)
            .collect();
        for frame_id in resident {
            self.write_back_if_dirty(frame_id)?;
        }
        Ok(())
    }

    /// Removes a page from the buffer pool, returning its frame to the free
    /// list. Deleting a page that is not resident is a success; deleting a
    /// pinned page fails and leaves all state unchanged. The dirty bytes of
    /// a deleted page are discarded, not written back.
    pub fn delete_page(&mut self, page_id: PageId) -> Result<()> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(()), // already absent counts as success
        };
        if self.frames[frame_id].pin_count() > 0 {
            return Err(Error::PagePinned(page_id.to_string()));
        }

        // Untrack first: a frame on the free list must never sit in the
        // tracker, or its next reuse would skip the write-back check.
        self.replacer.mark_pinned(frame_id);
        self.page_table.remove(&page_id);
        self.frames[frame_id].reset();
        self.free_list.push_back(frame_id);
        Ok(())
    }

    /// Returns the total number of frames in the buffer pool.
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Returns the number of frames that could hold a new page right now.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.len() + self.replacer.tracked_count()
    }

    /// Returns the pin count of a page, or `None` if it is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u16> {
        let frame_id = self.page_table.get(&page_id)?;
        Some(self.frames[*frame_id].pin_count())
    }

    pub(crate) fn disk_manager(&self) -> &Arc<Mutex<DiskManager>> {
        &self.disk_manager
    }

    /// Allocates a new page in `file_id` and returns a writable handle for
    /// it. Dropping the handle unpins the page.
    pub fn create_page_handle(
        bpm: &Arc<RwLock<BufferPoolManager>>,
        file_id: FileId,
    ) -> Result<PageFrameMutHandle<'_>> {
        let (page_id, page_frame) = {
            let mut bpm_guard = bpm.write()?;
            // SAFETY:
            // The handle must package a reference to a frame owned by the
            // BufferPoolManager together with the Arc to that same manager.
            // `create_page()` returns a reference into the manager, which the
            // borrow checker ties to `bpm_guard`, so the handle constructor
            // would be rejected: the whole manager counts as borrowed. We
            // split that borrow by going through a raw pointer. The exclusive
            // write lock is held for the duration of `create_page()`, and the
            // frame itself stays pinned afterwards, so the reference remains
            // valid once the guard is released.
            let bpm_ptr = &mut *bpm_guard as *mut BufferPoolManager;
            unsafe { (*bpm_ptr).create_page(file_id)? }
        };

        Ok(PageFrameMutHandle::new(bpm, page_frame, page_id))
    }

    /// Fetches a read-only handle to a page. Dropping the handle unpins the
    /// page.
    pub fn fetch_page_handle(
        bpm: &Arc<RwLock<BufferPoolManager>>,
        page_id: PageId,
    ) -> Result<PageFrameRefHandle<'_>> {
        let page_frame = {
            let mut bpm_guard = bpm.write()?;
            // SAFETY: see `create_page_handle`.
            let bpm_ptr = &mut *bpm_guard as *mut BufferPoolManager;
            unsafe { (*bpm_ptr).fetch_page(page_id)? }
        };

        Ok(PageFrameRefHandle::new(bpm, page_frame, page_id))
    }

    /// Fetches a writable handle to a page. Dropping the handle unpins the
    /// page and marks it dirty.
    pub fn fetch_page_mut_handle(
        bpm: &Arc<RwLock<BufferPoolManager>>,
        page_id: PageId,
    ) -> Result<PageFrameMutHandle<'_>> {
        let page_frame = {
            let mut bpm_guard = bpm.write()?;
            // SAFETY: see `create_page_handle`.
            let bpm_ptr = &mut *bpm_guard as *mut BufferPoolManager;
            unsafe { (*bpm_ptr).fetch_page(page_id)? }
        };

        Ok(PageFrameMutHandle::new(bpm, page_frame, page_id))
    }
}
