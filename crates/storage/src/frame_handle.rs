use crate::buffer_pool::BufferPoolManager;
use crate::frame::PageFrame;
use crate::typedef::PageId;
use core::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A handle for a read-only [`PageFrame`].
///
/// Holds the frame's read latch for its lifetime and unpins the page in the
/// buffer pool when dropped, allowing it to be evicted again.
pub struct PageFrameRefHandle<'a> {
    bpm: &'a Arc<RwLock<BufferPoolManager>>,
    page_frame: &'a PageFrame,
    page_id: PageId,
    _lock_guard: RwLockReadGuard<'a, ()>,
}

impl fmt::Debug for PageFrameRefHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrameRefHandle")
            .field("page_frame", &self.page_frame)
            .finish()
    }
}

impl<'a> PageFrameRefHandle<'a> {
    /// Creates a new read-only page handle. The frame must already be pinned
    /// on behalf of this handle and hold the identity `page_id`.
    pub(crate) fn new(
        bpm: &'a Arc<RwLock<BufferPoolManager>>,
        page_frame: &'a PageFrame,
        page_id: PageId,
    ) -> Self {
        let fp_ptr = &*page_frame as *const PageFrame;
        // SAFETY: the latch lives inside the frame we hold a reference to, so
        // borrowing it through a raw pointer sidesteps the check that would
        // otherwise tie the guard's lifetime to a fresh borrow of the frame.
        let lock_guard = unsafe { (*fp_ptr).read_lock() };
        PageFrameRefHandle {
            bpm,
            page_frame,
            page_id,
            _lock_guard: lock_guard,
        }
    }

    /// Returns the identity of the page this handle pins.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Drop for PageFrameRefHandle<'_> {
    fn drop(&mut self) {
        if let Ok(mut bpm) = self.bpm.write() {
            if let Err(e) = bpm.unpin_page(self.page_id, false) {
                log::error!("failed to unpin page {}: {}", self.page_id, e);
            }
        }
    }
}

/// Mutable page handle for write access. Unpinning on drop marks the page
/// dirty, since the holder had the means to modify it.
pub struct PageFrameMutHandle<'a> {
    bpm: &'a Arc<RwLock<BufferPoolManager>>,
    page_frame: &'a mut PageFrame,
    page_id: PageId,
    _lock_guard: RwLockWriteGuard<'a, ()>,
}

impl fmt::Debug for PageFrameMutHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrameMutHandle")
            .field("page_frame", &self.page_frame)
            .finish()
    }
}

impl<'a> PageFrameMutHandle<'a> {
    /// Creates a new mutable page handle. The frame must already be pinned on
    /// behalf of this handle and hold the identity `page_id`.
    pub(crate) fn new(
        bpm: &'a Arc<RwLock<BufferPoolManager>>,
        page_frame: &'a mut PageFrame,
        page_id: PageId,
    ) -> Self {
        let fp_ptr = &mut *page_frame as *mut PageFrame;
        // SAFETY: see `PageFrameRefHandle::new`.
        let lock_guard = unsafe { (*fp_ptr).write_lock() };
        PageFrameMutHandle {
            bpm,
            page_frame,
            page_id,
            _lock_guard: lock_guard,
        }
    }

    /// Returns the identity of the page this handle pins.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Drop for PageFrameMutHandle<'_> {
    fn drop(&mut self) {
        if let Ok(mut bpm) = self.bpm.write() {
            if let Err(e) = bpm.unpin_page(self.page_id, true) {
                log::error!("failed to unpin page {}: {}", self.page_id, e);
            }
        }
    }
}

/// Implement `Deref` for `PageFrameRefHandle` to provide transparent access to `PageFrame`.
impl Deref for PageFrameRefHandle<'_> {
    type Target = PageFrame;

    fn deref(&self) -> &Self::Target {
        self.page_frame
    }
}

/// Implement `Deref` for `PageFrameMutHandle` to provide transparent access to `PageFrame`.
impl Deref for PageFrameMutHandle<'_> {
    type Target = PageFrame;

    fn deref(&self) -> &Self::Target {
        self.page_frame
    }
}

/// Implement `DerefMut` for `PageFrameMutHandle` to allow mutable access to `PageFrame`.
impl DerefMut for PageFrameMutHandle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.page_frame
    }
}
