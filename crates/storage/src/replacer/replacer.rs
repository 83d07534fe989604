use std::fmt::Debug;

use crate::typedef::FrameId;

/// Tracks which buffer pool frames are currently evictable and picks victims.
///
/// A frame is tracked exactly while it is unpinned and still holds a
/// registered page; frames on the buffer pool's free list are never handed to
/// the tracker. Implementations guard their state with their own lock, so
/// every operation is atomic with respect to the others.
pub trait Replacer: Send + Sync + Debug {
    /// Inserts `frame_id` as the most recently unpinned entry. Inserting a
    /// frame that is already tracked is a no-op, not a reorder; a frame is
    /// tracked at most once.
    fn mark_unpinned(&self, frame_id: FrameId);

    /// Removes `frame_id` from the tracked set, preventing it from being
    /// selected as a victim. No-op if the frame is not tracked.
    fn mark_pinned(&self, frame_id: FrameId);

    /// Removes and returns the least recently unpinned tracked frame.
    /// Returns `None` if no frame is currently tracked.
    fn select_victim(&self) -> Option<FrameId>;

    /// Returns the number of currently evictable frames.
    fn tracked_count(&self) -> usize;
}
