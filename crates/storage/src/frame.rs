use core::fmt;
use std::sync::{
    atomic::{AtomicU16, Ordering},
    RwLock,
};

use crate::{page::PAGE_SIZE, typedef::PageId};

/// A fixed-capacity memory slot in the buffer pool, holding one page's bytes
/// plus the metadata the buffer pool manager needs: the identity of the page
/// currently occupying the frame (if any), a dirty flag, and a pin count.
pub struct PageFrame {
    page_id: Option<PageId>, // Identity of the resident page; `None` when unassigned
    is_dirty: bool,          // Tracks whether the page has been modified since last write-back
    pin_cnt: AtomicU16,      // Pin count indicating active users
    lock: RwLock<()>,        // Read-Write latch guarding the page bytes
    data: [u8; PAGE_SIZE],   // Page data storage
}

impl fmt::Debug for PageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrame")
            .field("page_id", &self.page_id)
            .field("is_dirty", &self.is_dirty)
            .field("pin_cnt", &self.pin_cnt.load(Ordering::SeqCst))
            .finish()
    }
}

impl PageFrame {
    /// Creates a new, unassigned frame.
    pub(crate) fn new() -> Self {
        Self {
            page_id: None,
            is_dirty: false,
            pin_cnt: AtomicU16::new(0),
            lock: RwLock::new(()),
            data: [0; PAGE_SIZE],
        }
    }

    /// Returns the identity of the resident page, or `None` if unassigned.
    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    /// Checks if the page has been modified since it was last written back.
    pub(crate) fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Returns the current pin count.
    pub(crate) fn pin_count(&self) -> u16 {
        self.pin_cnt.load(Ordering::Acquire)
    }

    /// Provides read-only access to the page bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Provides mutable access to the page bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Assigns a page identity to the frame.
    pub(crate) fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = Some(page_id);
    }

    /// Marks the page as dirty or clean.
    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.is_dirty = dirty;
    }

    /// Sets the pin count directly (overwrites whatever was there).
    pub(crate) fn set_pin_count(&mut self, pin_cnt: u16) {
        self.pin_cnt.store(pin_cnt, Ordering::Release);
    }

    /// Increments the pin count by 1.
    pub(crate) fn increment_pin_count(&mut self) {
        self.pin_cnt.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the pin count by 1. Decrementing a count that is already
    /// zero is a no-op; the count never goes negative.
    pub(crate) fn decrement_pin_count(&mut self) {
        let current = self.pin_cnt.load(Ordering::Acquire);
        if current > 0 {
            self.pin_cnt.store(current - 1, Ordering::Release);
        }
    }

    /// Resets the frame to its unassigned state, zeroing the bytes.
    pub(crate) fn reset(&mut self) {
        self.page_id = None;
        self.pin_cnt.store(0, Ordering::Release);
        self.is_dirty = false;
        self.data.fill(0);
    }

    /// Writes data to the page at the given offset.
    pub(crate) fn write(&mut self, offset: usize, data: &[u8]) {
        if offset + data.len() > PAGE_SIZE {
            panic!("Write out of bounds");
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Acquires a read latch on the page bytes.
    pub(crate) fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap()
    }

    /// Acquires a write latch on the page bytes.
    pub(crate) fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typedef::PageId;

    #[test]
    fn test_frame_pin_count_clamps_at_zero() {
        let mut frame = PageFrame::new();
        assert_eq!(frame.pin_count(), 0);

        frame.increment_pin_count();
        frame.increment_pin_count();
        assert_eq!(frame.pin_count(), 2);

        frame.decrement_pin_count();
        frame.decrement_pin_count();
        assert_eq!(frame.pin_count(), 0);

        // Decrementing past zero is tolerated, not an underflow.
        frame.decrement_pin_count();
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_frame_reset_clears_state() {
        let mut frame = PageFrame::new();
        frame.set_page_id(PageId::new(1, 7));
        frame.set_dirty(true);
        frame.set_pin_count(3);
        frame.write(0, b"junk");

        frame.reset();
        assert_eq!(frame.page_id(), None);
        assert!(!frame.is_dirty());
        assert_eq!(frame.pin_count(), 0);
        assert!(frame.data().iter().all(|&b| b == 0));
    }
}
